use thiserror::Error;

/// Storage failure kinds, matching the `storage` row of spec.md §7's error
/// taxonomy. Every variant is logged by the caller with an operation tag;
/// callers never distinguish further than "storage failed" when deciding the
/// caller-visible outcome (§4.3 maps all of these to `internal`).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to acquire advisory lock: {0}")]
    Lock(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Query(err.to_string())
    }
}

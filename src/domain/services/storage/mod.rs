//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Durable event/order storage behind a narrow, transactional interface
// (spec.md §4.1). Two implementations: an in-process reference store used by
// tests and single-node deployments, and a Postgres-backed store for
// production use. Both share one `StorageError` and one `Storage` /
// `StorageTransaction` trait pair.
//--------------------------------------------------------------------------------------------------

mod error;
mod memory;
mod postgres;
mod traits;

pub use error::StorageError;
pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;
pub use traits::{Storage, StorageTransaction};

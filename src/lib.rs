// Expose the modules
pub mod api;
pub mod config;
pub mod domain;

// Re-export key types for easier usage
pub use api::{Api, AppState};
pub use config::Config;
pub use domain::models::{Order, OrderEvent, OrderStatus};
pub use domain::services::broadcaster::{Broadcaster, RegistrationListener, ReplayProducer};
pub use domain::services::ingest::{IngestError, IngestService};
pub use domain::services::reconciler::{reconcile, FinalizationTimers, ReconcileError};
pub use domain::services::storage::{
    InMemoryStorage, PostgresStorage, Storage, StorageError, StorageTransaction,
};

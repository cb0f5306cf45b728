//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Process entry point. Reads configuration, constructs the storage backend,
// broadcaster, replay producer, and ingest service, wires them together, and
// serves the Axum router.
//--------------------------------------------------------------------------------------------------

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use order_event_service::api::{Api, AppState};
use order_event_service::config::Config;
use order_event_service::domain::services::broadcaster::{Broadcaster, ReplayProducer};
use order_event_service::domain::services::ingest::IngestService;
use order_event_service::domain::services::storage::{InMemoryStorage, PostgresStorage, Storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let storage: Arc<dyn Storage> = match &config.database_url {
        Some(url) => {
            info!("connecting to postgres storage backend");
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await?;
            Arc::new(PostgresStorage::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, running against the in-memory reference store");
            Arc::new(InMemoryStorage::new())
        }
    };

    // The broadcaster and replay producer reference each other only through
    // capability traits, wired together after both exist (spec.md §9).
    let broadcaster = Broadcaster::new();
    let replay_producer = ReplayProducer::new(storage.clone(), broadcaster.clone());
    broadcaster.set_listener(replay_producer);

    let ingest = Arc::new(IngestService::new(
        storage.clone(),
        broadcaster.clone(),
        config.finalization_timer,
    ));

    let state = Arc::new(AppState {
        ingest,
        broadcaster,
        storage,
        subscriber_idle_timeout: config.subscriber_idle_timeout,
    });

    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.bind_port).parse()?;
    let api = Api::new(addr, state);
    api.serve().await?;

    Ok(())
}

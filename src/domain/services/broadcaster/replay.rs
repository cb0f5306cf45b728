//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name           | Description                                                    | Key Methods |
// |----------------|----------------------------------------------------------------|-------------|
// | ReplayProducer  | Backfills a newly-registered sink with an order's in-order history | on_registration (via RegistrationListener) |
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::domain::services::storage::{Storage, StorageTransaction};

use super::broadcaster::{Broadcaster, RegistrationListener};

/// Loads an order's persisted in-order history and replays it to every
/// current subscriber whenever a new one registers (spec.md §4.5).
///
/// Holds an `Arc<Broadcaster>` to call `emit`/`unregister`; the broadcaster
/// holds this (as `Arc<dyn RegistrationListener>`) to call back into it. The
/// two are wired together after both exist — see the binary's startup
/// sequence — so neither side owns a mutable reference to the other (spec.md
/// §9 redesign flag).
pub struct ReplayProducer {
    storage: Arc<dyn Storage>,
    broadcaster: Arc<Broadcaster>,
}

impl ReplayProducer {
    pub fn new(storage: Arc<dyn Storage>, broadcaster: Arc<Broadcaster>) -> Arc<Self> {
        Arc::new(Self { storage, broadcaster })
    }
}

impl RegistrationListener for ReplayProducer {
    fn on_registration(&self, order_id: String, sink_id: u64) {
        let storage = self.storage.clone();
        let broadcaster = self.broadcaster.clone();
        tokio::spawn(async move {
            if let Err(err) = replay(&*storage, &broadcaster, &order_id).await {
                warn!(%order_id, %err, "replay failed, closing subscriber");
                broadcaster.unregister(&order_id, sink_id);
            }
        });
    }
}

/// Runs inside the same per-order locking discipline as ingest, so a
/// subscriber that registers while ingest is mutating the order has its
/// replay ordered relative to that commit rather than racing it.
#[instrument(skip(storage, broadcaster))]
async fn replay(
    storage: &dyn Storage,
    broadcaster: &Broadcaster,
    order_id: &str,
) -> Result<(), crate::domain::services::storage::StorageError> {
    let mut tx = storage.begin().await?;
    tx.acquire_lock(order_id).await?;

    let mut events = tx.get_events(order_id).await?;
    events.retain(|e| e.in_order);
    events.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));

    for event in events {
        broadcaster.emit(event).await;
    }

    tx.commit().await?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// STRUCTS & FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name          | Description                                                      | Key Methods |
// |---------------|------------------------------------------------------------------|-------------|
// | IngestError    | Typed outcome of a webhook ingest, mapped to HTTP status at the edge | -        |
// | IngestService  | Wires storage, reconciler, broadcaster and finalization timers      | handle_event |
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::models::{OrderEvent, OrderStatus};
use crate::domain::services::broadcaster::Broadcaster;
use crate::domain::services::reconciler::{reconcile, FinalizationTimers, ReconcileError};
use crate::domain::services::storage::{Storage, StorageError, StorageTransaction};

/// Outcome of a rejected or failed ingest. `Ok(())` from [`IngestService::handle_event`]
/// is the `ok` outcome from spec.md §4.3/§7; every other outcome is one of
/// these variants.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("event {event_id} already persisted")]
    Duplicate { event_id: String },

    #[error("order {order_id} already has an in-order terminal event")]
    Finalized { order_id: String },

    #[error("event does not extend the order's lifecycle: {0}")]
    InvalidSequence(#[from] ReconcileError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Coordinates one webhook event through the per-order critical section:
/// idempotency and terminal-lockout checks, reconciliation, persistence, and
/// fan-out (spec.md §4.3). Holds no state of its own beyond the collaborators
/// it was constructed with — safe to share behind an `Arc` across requests.
pub struct IngestService {
    storage: Arc<dyn Storage>,
    broadcaster: Arc<Broadcaster>,
    finalization: Arc<FinalizationTimers>,
}

impl IngestService {
    pub fn new(
        storage: Arc<dyn Storage>,
        broadcaster: Arc<Broadcaster>,
        finalization_delay: Duration,
    ) -> Self {
        Self {
            storage,
            broadcaster,
            finalization: Arc::new(FinalizationTimers::new(finalization_delay)),
        }
    }

    #[instrument(skip(self, incoming), fields(order_id = %incoming.order_id, event_id = %incoming.event_id))]
    pub async fn handle_event(&self, incoming: OrderEvent) -> Result<(), IngestError> {
        let mut tx = self.storage.begin().await?;
        tx.acquire_lock(&incoming.order_id).await?;

        if tx.exists_event(&incoming.event_id).await? {
            return Err(IngestError::Duplicate {
                event_id: incoming.event_id,
            });
        }

        if tx.exists_final_in_order(&incoming.order_id).await? {
            return Err(IngestError::Finalized {
                order_id: incoming.order_id,
            });
        }

        let mut events = tx.get_events(&incoming.order_id).await?;
        events.push(incoming.clone());

        let new_in_order = reconcile(&events)?;

        tx.upsert_events(&new_in_order).await?;

        let admitted = new_in_order
            .iter()
            .any(|e| e.event_id == incoming.event_id);
        if !admitted {
            tx.upsert_events(std::slice::from_ref(&incoming)).await?;
        }

        if let Some(last) = new_in_order.last() {
            tx.upsert_order(last.order_snapshot()).await?;
        }

        // Emit happens inside the same critical section as the write (spec.md
        // §4.3 step 7), matching replay.rs: the lock isn't released until every
        // subscriber has observed this admission, so two concurrent ingests for
        // the same order can never interleave their emits out of updated_at order.
        for event in &new_in_order {
            self.broadcaster.emit(event.clone()).await;
        }

        tx.commit().await?;

        if let Some(last) = new_in_order.last() {
            if last.order_status == OrderStatus::Chinazes {
                info!(order_id = %last.order_id, "arming finalization timer");
                self.finalization.arm(
                    self.storage.clone(),
                    self.broadcaster.clone(),
                    last.order_id.clone(),
                    last.event_id.clone(),
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::storage::InMemoryStorage;
    use chrono::{TimeZone, Utc};

    fn event(order_id: &str, event_id: &str, status: OrderStatus, secs: i64) -> OrderEvent {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        OrderEvent {
            event_id: event_id.to_string(),
            order_id: order_id.to_string(),
            user_id: "user-1".to_string(),
            order_status: status,
            updated_at: ts,
            created_at: ts,
            in_order: false,
            is_final: false,
        }
    }

    fn service() -> IngestService {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let broadcaster = Broadcaster::new();
        IngestService::new(storage, broadcaster, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn duplicate_event_id_is_rejected() {
        let svc = service();
        let e0 = event("order-1", "e0", OrderStatus::CoolOrderCreated, 0);
        svc.handle_event(e0.clone()).await.unwrap();

        let err = svc.handle_event(e0).await.unwrap_err();
        assert!(matches!(err, IngestError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn terminal_lockout_rejects_further_ingest() {
        let svc = service();
        svc.handle_event(event("order-1", "e0", OrderStatus::CoolOrderCreated, 0))
            .await
            .unwrap();
        svc.handle_event(event(
            "order-1",
            "e1",
            OrderStatus::ChangedMyMind,
            1,
        ))
        .await
        .unwrap();

        let err = svc
            .handle_event(event("order-1", "e2", OrderStatus::Failed, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Finalized { .. }));
    }

    #[tokio::test]
    async fn out_of_order_ingest_eventually_admits_every_event() {
        let svc = service();
        let e0 = event("order-1", "e0", OrderStatus::CoolOrderCreated, 0);
        let e1 = event("order-1", "e1", OrderStatus::SbuVerificationPending, 1);
        let e2 = event("order-1", "e2", OrderStatus::ConfirmedByMayor, 2);

        svc.handle_event(e2).await.unwrap(); // not yet admittable, persisted out-of-order
        svc.handle_event(e0).await.unwrap();
        svc.handle_event(e1).await.unwrap();

        let orders = svc.storage.get_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_status, OrderStatus::ConfirmedByMayor);
    }
}

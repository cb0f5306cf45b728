//--------------------------------------------------------------------------------------------------
// STRUCTS & FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name                  | Description                                             | Key Methods |
// |-----------------------|---------------------------------------------------------|-------------|
// | FinalizationTimers     | Deduplicates pending per-order `chinazes` timers         | arm         |
//--------------------------------------------------------------------------------------------------

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::domain::models::OrderStatus;
use crate::domain::services::broadcaster::Broadcaster;
use crate::domain::services::storage::{Storage, StorageError, StorageTransaction};

/// Schedules the delayed-finalization timer for `chinazes` admissions.
///
/// Per spec.md §4.2/§9, the contract is one pending timer per `order_id`, not
/// one per admission: a second `chinazes` admission for an order that already
/// has a pending timer is a no-op here rather than arming a duplicate.
pub struct FinalizationTimers {
    pending: Mutex<HashSet<String>>,
    delay: Duration,
}

impl FinalizationTimers {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: Mutex::new(HashSet::new()),
            delay,
        }
    }

    /// Arms the finalization timer for `order_id`/`event_id` unless one is
    /// already pending for this order. On fire, re-checks for a
    /// `give_my_money_back` event (the refund path winning the race) and
    /// otherwise marks the `chinazes` event final in storage and broadcasts
    /// the update.
    pub fn arm(
        self: &Arc<Self>,
        storage: Arc<dyn Storage>,
        broadcaster: Arc<Broadcaster>,
        order_id: String,
        event_id: String,
    ) {
        {
            let mut pending = self.pending.lock();
            if !pending.insert(order_id.clone()) {
                debug!(order_id = %order_id, "finalization timer already pending, skipping");
                return;
            }
        }

        let timers = self.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            timers.pending.lock().remove(&order_id);

            let result = finalize(&*storage, &broadcaster, &order_id, &event_id).await;

            match result {
                Ok(Some(())) => {}
                Ok(None) => debug!(order_id = %order_id, "refund path took over before timer fired"),
                Err(err) => {
                    // timer_deadline: logged, no client impact (spec.md §7)
                    error!(order_id = %order_id, error = %err, "finalization timer storage error");
                    warn!(order_id = %order_id, "next ingest for this order can still reconcile it");
                }
            }
        });
    }
}

/// Runs the timer body in one transaction: acquires the order's lock, checks
/// whether a refund has already won the race, and if not marks the pending
/// event final, updates the order snapshot, and emits the now-terminal event —
/// all before `commit`, so the lock is never released between the write and
/// the broadcast (mirrors replay.rs). An early return (refund found, or any
/// storage error) drops `tx` without calling `commit`, rolling back whatever
/// was read or written in this scope.
async fn finalize(
    storage: &dyn Storage,
    broadcaster: &Broadcaster,
    order_id: &str,
    event_id: &str,
) -> Result<Option<()>, StorageError> {
    let mut tx = storage.begin().await?;
    tx.acquire_lock(order_id).await?;

    let refunded = tx
        .exists_event_with_status(order_id, OrderStatus::GiveMyMoneyBack)
        .await?;
    if refunded {
        return Ok(None);
    }

    tx.update_event_final(event_id).await?;
    let events = tx.get_events(order_id).await?;
    let finalized = events.into_iter().find(|e| e.event_id == event_id);
    if let Some(event) = &finalized {
        tx.upsert_order(event.order_snapshot()).await?;
        broadcaster.emit(event.clone()).await;
    }

    tx.commit().await?;
    Ok(Some(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OrderEvent;
    use crate::domain::services::storage::InMemoryStorage;
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn event(order_id: &str, event_id: &str, status: OrderStatus) -> OrderEvent {
        let now = Utc::now();
        OrderEvent {
            event_id: event_id.to_string(),
            order_id: order_id.to_string(),
            user_id: "user-1".to_string(),
            order_status: status,
            updated_at: now,
            created_at: now,
            in_order: true,
            is_final: false,
        }
    }

    async fn seed(storage: &dyn Storage, event: OrderEvent) {
        let mut tx = storage.begin().await.unwrap();
        tx.acquire_lock(&event.order_id).await.unwrap();
        tx.upsert_events(&[event.clone()]).await.unwrap();
        tx.upsert_order(event.order_snapshot()).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn timer_finalizes_and_emits_when_no_refund_wins_the_race() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::channel(8);
        broadcaster.register("order-1", tx);

        seed(&*storage, event("order-1", "e0", OrderStatus::Chinazes)).await;

        let timers = Arc::new(FinalizationTimers::new(Duration::from_millis(20)));
        timers.arm(
            storage.clone(),
            broadcaster.clone(),
            "order-1".to_string(),
            "e0".to_string(),
        );

        let received = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("timer should have fired")
            .expect("channel should still be open");
        assert_eq!(received.event_id, "e0");
        assert!(received.is_final);

        let mut tx2 = storage.begin().await.unwrap();
        tx2.acquire_lock("order-1").await.unwrap();
        let events = tx2.get_events("order-1").await.unwrap();
        tx2.commit().await.unwrap();
        assert!(events.iter().find(|e| e.event_id == "e0").unwrap().is_final);
    }

    #[tokio::test]
    async fn refund_winning_the_race_prevents_finalization() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::channel(8);
        broadcaster.register("order-1", tx);

        seed(&*storage, event("order-1", "e0", OrderStatus::Chinazes)).await;
        seed(
            &*storage,
            event("order-1", "e1", OrderStatus::GiveMyMoneyBack),
        )
        .await;

        let timers = Arc::new(FinalizationTimers::new(Duration::from_millis(20)));
        timers.arm(
            storage.clone(),
            broadcaster.clone(),
            "order-1".to_string(),
            "e0".to_string(),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());

        let mut tx2 = storage.begin().await.unwrap();
        tx2.acquire_lock("order-1").await.unwrap();
        let events = tx2.get_events("order-1").await.unwrap();
        tx2.commit().await.unwrap();
        assert!(!events.iter().find(|e| e.event_id == "e0").unwrap().is_final);
    }
}

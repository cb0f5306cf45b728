//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                | Description                                             | Key Methods    |
// |---------------------|---------------------------------------------------------|----------------|
// | InMemoryStorage      | In-process reference store, for tests and single-node runs| begin          |
// | InMemoryTransaction  | Buffered transaction over the in-memory tables           | commit         |
//--------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::models::{Order, OrderEvent, OrderStatus};

use super::error::StorageError;
use super::traits::{Storage, StorageTransaction};

#[derive(Default)]
struct Tables {
    events: Vec<OrderEvent>,
    orders: HashMap<String, Order>,
}

/// In-process reference implementation of [`Storage`].
///
/// Used by the integration test suite and suitable for a single-process
/// deployment. There is no rollback log: each transaction buffers its writes
/// locally and applies them to the shared tables only on `commit`, so a
/// dropped (uncommitted) transaction leaves the shared state untouched —
/// the same externally-observable behavior as a real rollback.
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
    /// Per-`order_id` lock registry standing in for the advisory lock.
    locks: Arc<std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn begin(&self) -> Result<Box<dyn StorageTransaction>, StorageError> {
        Ok(Box::new(InMemoryTransaction {
            tables: self.tables.clone(),
            storage: InMemoryStorageHandle {
                locks: self.locks.clone(),
            },
            order_guard: None,
            buffered_events: HashMap::new(),
            buffered_order: None,
        }))
    }

    async fn get_orders(&self) -> Result<Vec<Order>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.values().cloned().collect())
    }
}

/// Cloneable handle to the lock registry, so a transaction can acquire a
/// lock without holding a reference back to `InMemoryStorage` itself.
struct InMemoryStorageHandle {
    locks: Arc<std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl InMemoryStorageHandle {
    fn lock_for(&self, order_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks
            .entry(order_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

struct InMemoryTransaction {
    tables: Arc<Mutex<Tables>>,
    storage: InMemoryStorageHandle,
    order_guard: Option<OwnedMutexGuard<()>>,
    /// Buffered upserts/updates, keyed by `event_id`, read-your-writes within
    /// this transaction and applied to `tables` only on commit.
    buffered_events: HashMap<String, OrderEvent>,
    buffered_order: Option<Order>,
}

impl InMemoryTransaction {
    /// The view of an order's events as this transaction would see it:
    /// committed rows overlaid with this transaction's own buffered writes.
    async fn visible_events(&self, order_id: &str) -> Vec<OrderEvent> {
        let tables = self.tables.lock().await;
        let mut by_id: HashMap<String, OrderEvent> = tables
            .events
            .iter()
            .filter(|e| e.order_id == order_id)
            .map(|e| (e.event_id.clone(), e.clone()))
            .collect();
        for (id, event) in &self.buffered_events {
            if event.order_id == order_id {
                by_id.insert(id.clone(), event.clone());
            }
        }
        by_id.into_values().collect()
    }

    async fn find_event(&self, event_id: &str) -> Option<OrderEvent> {
        if let Some(event) = self.buffered_events.get(event_id) {
            return Some(event.clone());
        }
        let tables = self.tables.lock().await;
        tables.events.iter().find(|e| e.event_id == event_id).cloned()
    }
}

#[async_trait]
impl StorageTransaction for InMemoryTransaction {
    async fn acquire_lock(&mut self, order_id: &str) -> Result<(), StorageError> {
        let lock = self.storage.lock_for(order_id);
        let guard = lock.lock_owned().await;
        self.order_guard = Some(guard);
        Ok(())
    }

    async fn exists_event(&mut self, event_id: &str) -> Result<bool, StorageError> {
        Ok(self.find_event(event_id).await.is_some())
    }

    async fn exists_final_in_order(&mut self, order_id: &str) -> Result<bool, StorageError> {
        Ok(self
            .visible_events(order_id)
            .await
            .iter()
            .any(|e| e.in_order && e.is_final))
    }

    async fn exists_event_with_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<bool, StorageError> {
        Ok(self
            .visible_events(order_id)
            .await
            .iter()
            .any(|e| e.order_status == status))
    }

    async fn get_events(&mut self, order_id: &str) -> Result<Vec<OrderEvent>, StorageError> {
        Ok(self.visible_events(order_id).await)
    }

    async fn upsert_events(&mut self, events: &[OrderEvent]) -> Result<(), StorageError> {
        for incoming in events {
            match self.find_event(&incoming.event_id).await {
                // Conflict: update only `in_order`, per spec.md §4.1.
                Some(mut existing) => {
                    existing.in_order = incoming.in_order;
                    self.buffered_events.insert(existing.event_id.clone(), existing);
                }
                None => {
                    self.buffered_events
                        .insert(incoming.event_id.clone(), incoming.clone());
                }
            }
        }
        Ok(())
    }

    async fn update_event_final(&mut self, event_id: &str) -> Result<(), StorageError> {
        let mut event = self.find_event(event_id).await.ok_or_else(|| {
            StorageError::Query(format!("no such event: {event_id}"))
        })?;
        event.is_final = true;
        self.buffered_events.insert(event.event_id.clone(), event);
        Ok(())
    }

    async fn upsert_order(&mut self, order: Order) -> Result<(), StorageError> {
        self.buffered_order = Some(order);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().await;
        for (event_id, event) in self.buffered_events {
            match tables.events.iter_mut().find(|e| e.event_id == event_id) {
                Some(slot) => *slot = event,
                None => tables.events.push(event),
            }
        }
        if let Some(order) = self.buffered_order {
            tables.orders.insert(order.order_id.clone(), order);
        }
        // self.order_guard drops here, releasing the per-order lock.
        Ok(())
    }
}

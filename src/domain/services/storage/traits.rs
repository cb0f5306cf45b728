//--------------------------------------------------------------------------------------------------
// TRAITS
//--------------------------------------------------------------------------------------------------
// | Name                | Description                                             | Key Methods    |
// |---------------------|---------------------------------------------------------|----------------|
// | StorageTransaction   | A single transactional + advisory-locked scope           | acquire_lock, commit |
// | Storage              | Durable event/order store, narrow and side-effect-describing | begin, get_orders |
//--------------------------------------------------------------------------------------------------

use async_trait::async_trait;

use crate::domain::models::{Order, OrderEvent, OrderStatus};

use super::error::StorageError;

/// A transactional, per-order-locked scope over the event/order tables.
///
/// Obtained from [`Storage::begin`]. Nested transactions are disallowed by
/// construction: a `StorageTransaction` does not expose a way to begin
/// another one. Dropping a transaction without calling [`commit`](Self::commit)
/// rolls it back; this is the "body-signalled failure rolls back" contract
/// from spec.md §4.1 made explicit rather than relying on out-of-band state
/// (§9 redesign flag).
#[async_trait]
pub trait StorageTransaction: Send {
    /// Takes an exclusive lock keyed by a stable hash of `order_id`, scoped
    /// to this transaction and released automatically when it ends. Blocks
    /// until granted. Lock-acquisition failure propagates as
    /// `StorageError::Lock` rather than being silently ignored (§9).
    async fn acquire_lock(&mut self, order_id: &str) -> Result<(), StorageError>;

    /// Idempotency check.
    async fn exists_event(&mut self, event_id: &str) -> Result<bool, StorageError>;

    /// Terminal-admission check: does this order already have an in-order,
    /// final event?
    async fn exists_final_in_order(&mut self, order_id: &str) -> Result<bool, StorageError>;

    /// Used by the finalization timer to detect a winning refund.
    async fn exists_event_with_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<bool, StorageError>;

    /// All persisted events for the order, in no particular order.
    async fn get_events(&mut self, order_id: &str) -> Result<Vec<OrderEvent>, StorageError>;

    /// Inserts new events; on `event_id` conflict, updates only `in_order`.
    async fn upsert_events(&mut self, events: &[OrderEvent]) -> Result<(), StorageError>;

    /// Sets `is_final = true` on one event.
    async fn update_event_final(&mut self, event_id: &str) -> Result<(), StorageError>;

    /// Inserts, or on `order_id` conflict overwrites, the order snapshot.
    async fn upsert_order(&mut self, order: Order) -> Result<(), StorageError>;

    /// Commits the transaction. Consumes `self`: there is no path back to
    /// using a committed (or rolled-back) transaction.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

/// Durable event/order store. Narrow and side-effect-describing, per
/// spec.md §4.1: callers always `begin()` a transaction and `acquire_lock`
/// before mutating rows for an order.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Scopes a fresh transaction. See [`StorageTransaction`].
    async fn begin(&self) -> Result<Box<dyn StorageTransaction>, StorageError>;

    /// All orders, for the read-only listing endpoint (outside the core).
    async fn get_orders(&self) -> Result<Vec<Order>, StorageError>;
}

//--------------------------------------------------------------------------------------------------
// STRUCTS & TRAITS
//--------------------------------------------------------------------------------------------------
// | Name                  | Description                                           | Key Methods    |
// |------------------------|-------------------------------------------------------|----------------|
// | RegistrationListener   | One-way capability invoked after a sink registers      | on_registration |
// | Broadcaster            | Per-order subscriber registry and fan-out              | register, unregister, emit |
//--------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::models::OrderEvent;

/// Invoked once, after a sink is registered, so the replay producer can load
/// history for it. This is a one-way dependency: the broadcaster holds an
/// `Arc<dyn RegistrationListener>`, the listener holds an emit/unregister
/// capability into the broadcaster — never a mutable cycle between the two
/// (spec.md §9 redesign flag).
pub trait RegistrationListener: Send + Sync {
    fn on_registration(&self, order_id: String, sink_id: u64);
}

struct Sink {
    id: u64,
    sender: mpsc::Sender<OrderEvent>,
}

/// Per-order subscriber registry and fan-out, guarded by a single mutex held
/// only for O(1) map operations and sink-list snapshots (spec.md §4.4/§5).
pub struct Broadcaster {
    registry: Mutex<HashMap<String, Vec<Sink>>>,
    next_id: AtomicU64,
    listener: OnceLock<Arc<dyn RegistrationListener>>,
}

impl Broadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            listener: OnceLock::new(),
        })
    }

    /// Two-phase init: the registration listener (the replay producer) is
    /// wired in after construction, so neither side needs a mutable
    /// back-reference to the other at construction time.
    pub fn set_listener(&self, listener: Arc<dyn RegistrationListener>) {
        if self.listener.set(listener).is_err() {
            warn!("broadcaster registration listener was already set");
        }
    }

    /// Registers a new sink for `order_id` and returns its id (used later to
    /// `unregister` it). Appends to the order's list — preserving
    /// registration order — then invokes the registration listener.
    pub fn register(&self, order_id: impl Into<String>, sender: mpsc::Sender<OrderEvent>) -> u64 {
        let order_id = order_id.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut registry = self.registry.lock();
            registry.entry(order_id.clone()).or_default().push(Sink { id, sender });
        }
        if let Some(listener) = self.listener.get() {
            listener.on_registration(order_id, id);
        }
        id
    }

    /// Removes `sink_id` from `order_id`'s list if present, closing it (by
    /// dropping its sender — the owning receiver observes the channel
    /// close). A no-op if the sink is already gone or unknown, matching the
    /// idempotent-unregister contract in spec.md §4.4 (§9 redesign flag: a
    /// real removal, not the source's zero-width delete).
    pub fn unregister(&self, order_id: &str, sink_id: u64) {
        let mut registry = self.registry.lock();
        if let Some(sinks) = registry.get_mut(order_id) {
            sinks.retain(|s| s.id != sink_id);
            if sinks.is_empty() {
                registry.remove(order_id);
            }
        }
    }

    /// Delivers `event` to every sink subscribed to `event.order_id`. Holds
    /// the registry lock only long enough to snapshot the sink list; the
    /// actual sends happen after releasing it, so a slow or blocked consumer
    /// cannot cause priority inversion against unrelated orders (spec.md §9
    /// redesign flag). If `event.is_final`, closes and drops every sink for
    /// the order after delivery.
    pub async fn emit(&self, event: OrderEvent) {
        let senders: Vec<mpsc::Sender<OrderEvent>> = {
            let registry = self.registry.lock();
            registry
                .get(&event.order_id)
                .map(|sinks| sinks.iter().map(|s| s.sender.clone()).collect())
                .unwrap_or_default()
        };

        debug!(order_id = %event.order_id, event_id = %event.event_id, subscribers = senders.len(), "emitting order event");

        for sender in &senders {
            // A closed receiver means that subscriber is already gone; not
            // our problem to report (broadcast_overflow is the only send
            // failure this layer logs, and a closed channel isn't one).
            let _ = sender.send(event.clone()).await;
        }

        if event.is_final {
            let mut registry = self.registry.lock();
            registry.remove(&event.order_id);
        }
    }
}

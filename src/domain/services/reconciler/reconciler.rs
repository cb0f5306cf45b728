//--------------------------------------------------------------------------------------------------
// STRUCTS & FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name                      | Description                                          | Key Methods |
// |---------------------------|------------------------------------------------------|-------------|
// | ReconcileError            | Failure computing the in-order prefix                | -           |
// | reconcile                 | Computes newly-admitted in-order events               | -           |
//--------------------------------------------------------------------------------------------------

use thiserror::Error;

use crate::domain::models::{OrderEvent, OrderStatus};

/// Errors raised while extending the in-order prefix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A non-in-order event was found following an in-order terminal event.
    #[error("event {event_id} follows an in-order terminal event for its order")]
    InvalidSequence { event_id: String },
}

/// Computes the longest extension of the in-order prefix that `events`
/// supports, per spec.md §4.2.
///
/// `events` need not be sorted; this function stably sorts a local copy
/// ascending by `updated_at` before walking it. Events already marked
/// `in_order` act as anchors that pin the current lifecycle position;
/// everything else is a candidate for admission.
///
/// Returns the events newly marked `in_order` (and, where applicable,
/// `is_final`), in walk order. The returned events are NOT a subset of the
/// input slice by reference — they are cloned so callers can persist them
/// directly. Events that are anchors, or that the walk stops at without
/// admitting, are not returned.
pub fn reconcile(events: &[OrderEvent]) -> Result<Vec<OrderEvent>, ReconcileError> {
    let mut sorted: Vec<OrderEvent> = events.to_vec();
    sorted.sort_by_key(|e| e.updated_at);

    let mut current = OrderStatus::Initial;
    let mut finalized = false;
    let mut admitted = Vec::new();

    for mut event in sorted {
        if event.in_order {
            current = event.order_status;
            finalized = finalized || event.is_final;
            continue;
        }

        if finalized {
            return Err(ReconcileError::InvalidSequence {
                event_id: event.event_id,
            });
        }

        if current.transitions_from().contains(&event.order_status) {
            event.in_order = true;
            event.is_final = event.order_status.is_terminal();
            finalized = event.is_final;
            current = event.order_status;
            admitted.push(event);
        } else {
            // Stop: this and all later events remain out-of-order for now.
            break;
        }
    }

    Ok(admitted)
}

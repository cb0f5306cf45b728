//--------------------------------------------------------------------------------------------------
// ENUMS & STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name            | Description                                          | Key Methods        |
// |-----------------|------------------------------------------------------|--------------------|
// | OrderStatus     | A node in the order lifecycle state machine           | is_terminal, transitions_from |
// | OrderEvent      | A single webhook-delivered fact about an order        | order_snapshot     |
// | Order           | The most recent in-order snapshot for an order        | from_event         |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node in the order lifecycle state machine.
///
/// `Initial` is a synthetic root: it is never carried by an [`OrderEvent`] and
/// exists only as the starting point `reconcile` walks forward from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Initial,
    CoolOrderCreated,
    SbuVerificationPending,
    ConfirmedByMayor,
    ChangedMyMind,
    Failed,
    Chinazes,
    GiveMyMoneyBack,
}

impl OrderStatus {
    /// Statuses reachable in one hop from `self`, per the lifecycle graph in
    /// spec.md §4.2. A status with no entry here is terminal.
    pub fn transitions_from(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Initial => &[CoolOrderCreated],
            CoolOrderCreated => &[SbuVerificationPending, ChangedMyMind, Failed],
            SbuVerificationPending => &[ConfirmedByMayor, ChangedMyMind, Failed],
            ConfirmedByMayor => &[Chinazes, ChangedMyMind, Failed],
            Chinazes => &[GiveMyMoneyBack],
            ChangedMyMind | Failed | GiveMyMoneyBack => &[],
        }
    }

    /// Whether admission of this status in order forbids further admissions
    /// for the order. `Chinazes` is conditionally terminal: it becomes final
    /// only via the delayed-finalization timer (§4.2), so it reports `false`
    /// here and the reconciler sets `is_final` separately when arming the
    /// event.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::ChangedMyMind | OrderStatus::Failed | OrderStatus::GiveMyMoneyBack
        )
    }
}

/// A single webhook-delivered fact about an order's lifecycle.
///
/// `in_order` and `is_final` are server-internal: they are set by the
/// reconciler, never by the webhook payload, and are omitted from the
/// deserialized wire request (see `api::dto::IngestRequest`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub event_id: String,
    pub order_id: String,
    pub user_id: String,
    pub order_status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub in_order: bool,
    #[serde(default)]
    pub is_final: bool,
}

impl OrderEvent {
    /// Projects this event onto the order fields, as described by the
    /// invariant "the Order row equals the last event of the in-order prefix
    /// projected to order fields" (spec.md §3).
    pub fn order_snapshot(&self) -> Order {
        Order {
            order_id: self.order_id.clone(),
            user_id: self.user_id.clone(),
            order_status: self.order_status,
            is_final: self.is_final,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The most recent in-order snapshot for an order. Derived, uniquely keyed by
/// `order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub user_id: String,
    pub order_status: OrderStatus,
    pub is_final: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name               | Description                                            | Key Methods  |
// |--------------------|--------------------------------------------------------|--------------|
// | WebhookEvent        | Wire shape accepted by the ingest endpoint             | into_domain, validate |
// | OrderEventResponse  | Wire shape emitted on the SSE stream                   | from(OrderEvent) |
// | OrderResponse       | Wire shape returned by `GET /orders`                   | from(Order)  |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::{Order, OrderEvent, OrderStatus};

/// Webhook request body. Per spec.md §6, `is_final` and `in_order` are
/// server-internal and never accepted from a caller.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event_id: String,
    pub order_id: String,
    pub user_id: String,
    pub order_status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Rejects a body with a blank required string field. `order_status`
    /// deserialization already rejects anything outside the eight known
    /// variants, and `initial` is excluded here since no event may carry it.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_id.trim().is_empty() {
            return Err("event_id must not be blank".to_string());
        }
        if self.order_id.trim().is_empty() {
            return Err("order_id must not be blank".to_string());
        }
        if self.user_id.trim().is_empty() {
            return Err("user_id must not be blank".to_string());
        }
        if self.order_status == OrderStatus::Initial {
            return Err("order_status must not be the synthetic initial root".to_string());
        }
        Ok(())
    }

    pub fn into_domain(self) -> OrderEvent {
        OrderEvent {
            event_id: self.event_id,
            order_id: self.order_id,
            user_id: self.user_id,
            order_status: self.order_status,
            updated_at: self.updated_at,
            created_at: self.created_at,
            in_order: false,
            is_final: false,
        }
    }
}

/// SSE payload. `is_final` is allowed to appear here even though it never
/// appears on the way in.
#[derive(Debug, Clone, Serialize)]
pub struct OrderEventResponse {
    pub event_id: String,
    pub order_id: String,
    pub user_id: String,
    pub order_status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_final: bool,
}

impl From<OrderEvent> for OrderEventResponse {
    fn from(event: OrderEvent) -> Self {
        Self {
            event_id: event.event_id,
            order_id: event.order_id,
            user_id: event.user_id,
            order_status: event.order_status,
            updated_at: event.updated_at,
            created_at: event.created_at,
            is_final: event.is_final,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub user_id: String,
    pub order_status: OrderStatus,
    pub is_final: bool,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            user_id: order.user_id,
            order_status: order.order_status,
            is_final: order.is_final,
            updated_at: order.updated_at,
            created_at: order.created_at,
        }
    }
}

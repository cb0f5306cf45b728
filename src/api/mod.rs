//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Axum HTTP surface for the order-event reconciliation service (spec.md §6):
// the webhook ingest endpoint, the per-order SSE stream, and the read-only
// order listing.
//
// | Component      | Description                                                |
// |----------------|-------------------------------------------------------------|
// | AppState       | Shared collaborators reachable from every handler            |
// | Api            | Builds the router and serves it                              |
// | Routes         | Handler functions for the three endpoints                    |
// | DTOs           | Wire shapes for requests/responses                           |
// | Error          | Maps domain errors onto HTTP status codes                    |
//--------------------------------------------------------------------------------------------------

mod dto;
mod error;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::domain::services::broadcaster::Broadcaster;
use crate::domain::services::ingest::IngestService;
use crate::domain::services::storage::Storage;

pub use error::{ApiError, ApiResult};

/// Shared application state accessible by every handler.
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub broadcaster: Arc<Broadcaster>,
    pub storage: Arc<dyn Storage>,
    pub subscriber_idle_timeout: Duration,
}

/// Main API structure: holds the bind address and the shared state, and
/// builds/serves the router.
pub struct Api {
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl Api {
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// Creates the router: the three endpoints from spec.md §6, plus tracing
    /// and permissive-for-local-dev CORS layers.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ])
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route("/webhooks/payments/orders", post(routes::ingest_webhook))
            .route(
                "/orders/:order_id/events",
                get(routes::stream_order_events),
            )
            .route("/orders", get(routes::list_orders))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.routes();

        info!(addr = %self.addr, "order event service listening");
        let listener = TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

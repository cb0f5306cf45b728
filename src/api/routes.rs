//--------------------------------------------------------------------------------------------------
// FUNCTIONS & STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                  | Description                                  | Return Type         |
// |-----------------------|----------------------------------------------|---------------------|
// | ingest_webhook         | Accepts one webhook event (spec.md §4.3)     | ApiResult<StatusCode> |
// | stream_order_events    | SSE stream of in-order events (spec.md §4.4) | Sse<...>            |
// | list_orders            | Lists all order snapshots                    | ApiResult<Json<...>> |
// | IdleTimeoutStream      | Closes a sink's stream after T_idle silence  | poll_next           |
//--------------------------------------------------------------------------------------------------

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use super::dto::{OrderEventResponse, OrderResponse, WebhookEvent};
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::domain::services::broadcaster::Broadcaster;

pub async fn ingest_webhook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WebhookEvent>,
) -> ApiResult<impl IntoResponse> {
    body.validate().map_err(ApiError::Validation)?;

    let order_id = body.order_id.clone();
    state.ingest.handle_event(body.into_domain()).await?;

    info!(order_id = %order_id, "webhook accepted");
    Ok(axum::http::StatusCode::OK)
}

pub async fn stream_order_events(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(64);
    let sink_id = state.broadcaster.register(order_id.clone(), tx);

    let events = ReceiverStream::new(rx).map(|event| {
        let response = OrderEventResponse::from(event);
        let is_final = response.is_final;
        let payload = serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string());
        (Event::default().data(payload), is_final)
    });

    let stream = IdleTimeoutStream::new(
        events,
        state.subscriber_idle_timeout,
        order_id,
        sink_id,
        state.broadcaster.clone(),
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Wraps the per-sink event stream with the subscriber idle timeout
/// (spec.md §5): if no event arrives within `timeout` of the last one, the
/// sink is unregistered and the stream ends. The stream also ends right
/// after a final event, mirroring the broadcaster's own terminal close.
struct IdleTimeoutStream<S> {
    inner: S,
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
    order_id: String,
    sink_id: u64,
    broadcaster: Arc<Broadcaster>,
    closed: bool,
}

impl<S> IdleTimeoutStream<S> {
    fn new(
        inner: S,
        timeout: Duration,
        order_id: String,
        sink_id: u64,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            inner,
            timeout,
            sleep: Box::pin(tokio::time::sleep(timeout)),
            order_id,
            sink_id,
            broadcaster,
            closed: false,
        }
    }
}

impl<S> Stream for IdleTimeoutStream<S>
where
    S: Stream<Item = (Event, bool)> + Unpin,
{
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.closed {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some((event, is_final))) => {
                if is_final {
                    self.closed = true;
                } else {
                    let deadline = Instant::now() + self.timeout;
                    self.sleep.as_mut().reset(deadline);
                }
                return Poll::Ready(Some(Ok(event)));
            }
            Poll::Ready(None) => {
                self.closed = true;
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        match self.sleep.as_mut().poll(cx) {
            Poll::Ready(()) => {
                warn!(order_id = %self.order_id, "subscriber idle timeout, closing stream");
                self.broadcaster.unregister(&self.order_id, self.sink_id);
                self.closed = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

pub async fn list_orders(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let orders = state.storage.get_orders().await?;
    let response: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(response))
}

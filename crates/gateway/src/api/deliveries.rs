//! Delivery outbox API.  Connectors poll the list or follow the SSE feed and
//! forward each delivery's items to its destination.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::outbox::OutboxDelivery;
use crate::state::AppState;

const MAX_PAGE_SIZE: usize = 100;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/deliveries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct DeliveriesQuery {
    /// Only deliveries for this session key.
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    25
}

#[derive(Debug, Serialize)]
pub struct DeliveryPage {
    pub deliveries: Vec<OutboxDelivery>,
    pub total: usize,
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<DeliveriesQuery>,
) -> impl IntoResponse {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let (deliveries, total) = state
        .outbox
        .list(query.destination.as_deref(), limit, query.offset)
        .await;
    Json(DeliveryPage { deliveries, total })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/deliveries/events (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub destination: Option<String>,
}

/// One `delivery.new` event per outbox push.  A subscriber that falls behind
/// skips what it missed and picks up the list endpoint to catch up.
pub async fn delivery_events_sse(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let mut rx = state.outbox.subscribe();
    let destination = query.destination;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(delivery) => {
                    if destination.as_deref().is_some_and(|d| d != delivery.destination) {
                        continue;
                    }
                    match Event::default().event("delivery.new").json_data(&delivery) {
                        Ok(event) => yield Ok(event),
                        Err(e) => tracing::warn!(error = %e, id = %delivery.id, "delivery event not encoded"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "delivery subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub mod auth;
pub mod catalog;
pub mod channel;
pub mod deliveries;
pub mod messages;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// `/health` is public; everything under `/v1` sits behind the bearer-token
/// middleware.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health));

    let protected = Router::new()
        // Archive channel ingress
        .route("/v1/channel/posts", post(channel::channel_post))
        .route("/v1/channel/edits", post(channel::edited_post))
        // Private chat ingress (browse flow)
        .route("/v1/messages", post(messages::message))
        // Catalog
        .route("/v1/search", get(catalog::search))
        .route("/v1/catalog/entries", post(catalog::add_entry))
        // Delivery outbox
        .route("/v1/deliveries", get(deliveries::list_deliveries))
        .route("/v1/deliveries/events", get(deliveries::delivery_events_sse))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "catalog_entries": state.catalog.len(),
        "open_groups": state.aggregator.open_groups(),
        "cached_option_sets": state.option_cache.len(),
    }))
}

/// `{ "error": message }` with the given status.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

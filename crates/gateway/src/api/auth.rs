//! Bearer-token middleware for the `/v1` routes.
//!
//! The token comes from the env var named by `server.api_token_env` (default
//! `SHELF_API_TOKEN`), read once at startup and kept only as a SHA-256
//! digest in `AppState`.  Without a token every request is let through.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.api_token_hash else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // Compare fixed-length digests so timing reveals nothing about length.
    let provided = Sha256::digest(provided.as_bytes());
    if !bool::from(provided.as_slice().ct_eq(expected.as_slice())) {
        return super::error_response(StatusCode::UNAUTHORIZED, "invalid or missing API token");
    }

    next.run(req).await
}

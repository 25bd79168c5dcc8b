use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use shelf_domain::catalog::CatalogEntry;

use super::error_response;
use crate::catalog::SEARCH_PAGE_SIZE;
use crate::state::AppState;

const MAX_PAGE_SIZE: usize = 50;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    SEARCH_PAGE_SIZE
}

pub async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Response {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    Json(state.catalog.search(&query.q, query.offset, limit)).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/catalog/entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct NewEntry {
    pub name: String,
    #[serde(default)]
    pub tutor: Option<String>,
    pub level: u8,
    pub term: u8,
    #[serde(default)]
    pub category: Option<String>,
}

pub async fn add_entry(State(state): State<AppState>, Json(body): Json<NewEntry>) -> Response {
    let name = body.name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "name must not be empty");
    }
    if !(1..=4).contains(&body.level) || !(1..=2).contains(&body.term) {
        return error_response(StatusCode::BAD_REQUEST, "level must be 1-4 and term 1-2");
    }

    let entry = CatalogEntry {
        name,
        tutor: body.tutor,
        level: body.level,
        term: body.term,
        category: body
            .category
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|| state.config.intake.default_category.clone()),
        items: Vec::new(),
    };

    match state.catalog.add_entry(entry.clone()) {
        Ok(true) => {
            state.option_cache.invalidate(None);
            (StatusCode::CREATED, Json(entry)).into_response()
        }
        Ok(false) => error_response(StatusCode::CONFLICT, "a course with that name exists"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

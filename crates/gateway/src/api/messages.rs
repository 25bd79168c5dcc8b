//! Private chat ingress: `POST /v1/messages`.
//!
//! Connectors post the user's text and get back the messages to send, each
//! with an optional reply keyboard.  `/browse` starts a fresh browse flow,
//! `/start` greets, anything else goes to the user's open flow.  Requests
//! for one peer are serialized through the session lock map.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use shelf_browse::flow::GOODBYE;
use shelf_browse::{FlowSession, FlowSessionStore, Reply};
use shelf_domain::config::NavigationLabels;

use super::error_response;
use crate::state::AppState;

pub const GREETING: &str = "Hello! Use /browse to start browsing.";
pub const NO_SESSION: &str = "Send /browse to start browsing.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    /// Raw peer ID of the sender.
    pub peer_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub session_key: String,
    pub actions: Vec<OutboundAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundAction {
    #[serde(rename = "type")]
    pub action_type: &'static str,
    pub text: String,
    /// Reply keyboard, one inner vec per row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Vec<Vec<String>>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub remove_keyboard: bool,
}

impl OutboundAction {
    fn text(text: impl Into<String>) -> Self {
        Self {
            action_type: "send_text",
            text: text.into(),
            keyboard: None,
            remove_keyboard: false,
        }
    }

    fn closing(text: impl Into<String>) -> Self {
        Self {
            remove_keyboard: true,
            ..Self::text(text)
        }
    }
}

pub fn session_key(peer_id: &str) -> String {
    format!("peer:{}", peer_id.trim())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn message(
    State(state): State<AppState>,
    Json(body): Json<IncomingMessage>,
) -> Response {
    if body.peer_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "peer_id must not be empty");
    }
    let key = session_key(&body.peer_id);

    let _permit = match state.session_locks.acquire(&key).await {
        Ok(p) => p,
        Err(busy) => return error_response(StatusCode::TOO_MANY_REQUESTS, busy.to_string()),
    };

    let text = body.text.trim();
    let nav = state.flow.navigation();

    let actions = match text {
        "/start" => vec![OutboundAction::closing(GREETING)],
        "/browse" => {
            let mut session = FlowSession::new(key.clone());
            let replies = state.flow.enter(&mut session).await;
            if let Err(e) = save(&state, session).await {
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
            render(&replies, nav)
        }
        _ => {
            let existing = match state.sessions.get(&key).await {
                Ok(s) => s,
                Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            };
            match existing.filter(FlowSession::is_open) {
                Some(mut session) => {
                    let replies = state.flow.handle_text(&mut session, text).await;
                    if let Err(e) = save(&state, session).await {
                        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
                    }
                    render(&replies, nav)
                }
                None => vec![OutboundAction::text(NO_SESSION)],
            }
        }
    };

    Json(MessageResponse {
        session_key: key,
        actions,
    })
    .into_response()
}

async fn save(state: &AppState, session: FlowSession) -> shelf_domain::Result<()> {
    if session.is_open() {
        state.sessions.put(session).await
    } else {
        state.sessions.clear(&session.key).await
    }
}

/// Turn flow replies into chat actions.  Prompts carry the option keyboard
/// followed by the navigation rows.
pub fn render(replies: &[Reply], nav: &NavigationLabels) -> Vec<OutboundAction> {
    replies
        .iter()
        .map(|reply| match reply {
            Reply::Prompt {
                text,
                options,
                can_go_back,
            } => {
                let mut rows: Vec<Vec<String>> = options.iter().map(|o| vec![o.clone()]).collect();
                if *can_go_back {
                    rows.push(vec![nav.back.clone(), nav.restart.clone()]);
                }
                rows.push(vec![nav.exit.clone()]);
                OutboundAction {
                    keyboard: Some(rows),
                    ..OutboundAction::text(text.clone())
                }
            }
            Reply::Notice { text } => OutboundAction::text(text.clone()),
            Reply::Delivered { count } => OutboundAction::text(match count {
                0 => "No files matched this selection.".to_string(),
                1 => "Sent 1 file.".to_string(),
                n => format!("Sent {n} files."),
            }),
            Reply::Closed => OutboundAction::closing(GOODBYE),
        })
        .collect()
}

//! Archive channel ingress.
//!
//! - `POST /v1/channel/posts`: a new post.  Files go through the album
//!   aggregator; replies carrying `del` / `edit` run as curator commands.
//! - `POST /v1/channel/edits`: a post whose caption was edited.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use shelf_intake::{ChannelPost, CuratorCommand, Submitted};

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostOutcome {
    /// Not from the archive chat, or nothing to file.
    Ignored { reason: &'static str },
    Command { command: &'static str, applied: bool },
    Delivered,
    Buffered { group_key: String, position: usize },
}

fn from_archive(state: &AppState, post: &ChannelPost) -> bool {
    let archive = state.config.intake.archive_chat_id;
    archive == 0 || post.chat_id == archive
}

pub async fn channel_post(
    State(state): State<AppState>,
    Json(post): Json<ChannelPost>,
) -> Response {
    if !from_archive(&state, &post) {
        return Json(PostOutcome::Ignored {
            reason: "not the archive chat",
        })
        .into_response();
    }

    if let Some(command) = CuratorCommand::parse(&post) {
        let name = match &command {
            CuratorCommand::Delete(_) => "del",
            CuratorCommand::Edit(_) => "edit",
        };
        tracing::info!(command = name, message_id = post.message_id, "curator command received");
        return match state.intake.run_command(command).await {
            Ok(applied) => Json(PostOutcome::Command {
                command: name,
                applied,
            })
            .into_response(),
            Err(e) => {
                tracing::warn!(error = %e, command = name, "curator command failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
    }

    if post.media.is_none() {
        return Json(PostOutcome::Ignored {
            reason: "no file attached",
        })
        .into_response();
    }

    let outcome = match state
        .aggregator
        .submit(post.media_group_id.clone(), post)
        .await
    {
        Submitted::Delivered => PostOutcome::Delivered,
        Submitted::Buffered {
            group_key,
            position,
        } => PostOutcome::Buffered {
            group_key,
            position,
        },
    };
    (StatusCode::ACCEPTED, Json(outcome)).into_response()
}

#[derive(Debug, Serialize)]
pub struct EditOutcome {
    pub updated: bool,
}

pub async fn edited_post(
    State(state): State<AppState>,
    Json(post): Json<ChannelPost>,
) -> Response {
    if !from_archive(&state, &post) {
        return Json(EditOutcome { updated: false }).into_response();
    }
    match state.intake.apply_edit(&post).await {
        Ok(updated) => Json(EditOutcome { updated }).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, message_id = post.message_id, "edit not applied");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

//! Chat routes: JSON chat entries and their per-session overview.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use super::error::{ApiError, ApiJson, ApiQuery};
use super::params::{PageParams, non_empty, parse_id, require_text};
use crate::store::chats::{Chat, ChatPatch, DEFAULT_SESSION_LIMIT, SessionSummary};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/chats", get(list).post(create))
        .route("/api/chats/stats", get(stats))
        .route("/api/chats/sessions", get(sessions))
        .route("/api/chats/session/{session_id}", get(by_session))
        .route("/api/chats/{id}", get(get_one).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    session_id: Option<String>,
    #[serde(flatten)]
    page: PageParams,
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Chat>>, ApiError> {
    let page = query.page.page()?;
    let session = non_empty(query.session_id);
    let chats = state
        .chats
        .list(session.as_deref(), page)
        .await
        .map_err(ApiError::database("Failed to list chats"))?;
    Ok(Json(chats))
}

async fn by_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Vec<Chat>>, ApiError> {
    let page = params.page()?;
    let chats = state
        .chats
        .list(Some(&session_id), page)
        .await
        .map_err(ApiError::database("Failed to list session chats"))?;
    Ok(Json(chats))
}

async fn sessions(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let page = params.page_with_default(DEFAULT_SESSION_LIMIT)?;
    let sessions = state
        .chats
        .sessions(page.limit)
        .await
        .map_err(ApiError::database("Failed to list sessions"))?;
    Ok(Json(sessions))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Chat>, ApiError> {
    let id = parse_id(&id)?;
    state
        .chats
        .get(id)
        .await
        .map_err(ApiError::database("Failed to load chat"))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Chat not found"))
}

#[derive(Debug, Deserialize)]
struct CreateChat {
    session_id: Option<String>,
    message: Option<serde_json::Value>,
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateChat>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = require_text("session_id", body.session_id)?;
    let message = match body.message {
        None | Some(serde_json::Value::Null) => {
            return Err(ApiError::bad_request("message is required"));
        }
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => {
            return Err(ApiError::bad_request("message is required"));
        }
        Some(message) => message,
    };
    let created = state
        .chats
        .create(&session_id, message, Utc::now())
        .await
        .map_err(ApiError::database("Failed to create chat"))?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ChatPatch>,
) -> Result<Json<Chat>, ApiError> {
    let id = parse_id(&id)?;
    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    state
        .chats
        .update(id, &patch)
        .await
        .map_err(ApiError::database("Failed to update chat"))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Chat not found"))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .chats
        .delete(id)
        .await
        .map_err(ApiError::database("Failed to delete chat"))?;
    if !deleted {
        return Err(ApiError::not_found("Chat not found"));
    }
    Ok(Json(json!({ "success": true, "message": "Chat deleted" })))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .chats
        .stats()
        .await
        .map_err(ApiError::database("Failed to load chat statistics"))?;
    Ok(Json(stats))
}

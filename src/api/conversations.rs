//! Conversation routes: webhook ingestion, message CRUD, status changes and
//! dashboard counters.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::AppState;
use super::error::{ApiError, ApiJson, ApiQuery};
use super::params::{PageParams, non_empty, parse_id, require_text};
use crate::live::LiveEvent;
use crate::store::conversations::{
    Message, MessageDirection, MessagePatch, NewMessage, UNKNOWN_CONTACT_NAME,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/webhook/message", post(webhook))
        .route("/api/conversations", get(list).post(create))
        .route("/api/conversations/stats", get(stats))
        .route("/api/stats", get(stats))
        .route(
            "/api/conversations/{id}",
            get(get_one).put(update).delete(remove),
        )
        .route("/api/conversations/{id}/status", put(update_status))
}

/// Inbound message as posted by the messaging gateway or the dashboard.
#[derive(Debug, Deserialize)]
struct IncomingMessage {
    phone_number: Option<String>,
    contact_name: Option<String>,
    message: Option<String>,
    message_type: Option<MessageDirection>,
    metadata: Option<serde_json::Value>,
}

impl IncomingMessage {
    fn validate(self) -> Result<NewMessage, ApiError> {
        Ok(NewMessage {
            phone_number: require_text("phone_number", self.phone_number)?,
            message: require_text("message", self.message)?,
            contact_name: non_empty(self.contact_name),
            message_type: self.message_type.unwrap_or_default(),
            metadata: self.metadata,
        })
    }
}

/// Store a message, count it against its contact, then notify live clients.
async fn record_message(state: &AppState, new: NewMessage) -> Result<Message, ApiError> {
    let stored = state
        .conversations
        .insert(&new, Utc::now())
        .await
        .map_err(ApiError::database("Failed to store message"))?;

    state
        .contacts
        .record_interaction(
            &stored.phone_number,
            stored.contact_name.as_deref().unwrap_or(UNKNOWN_CONTACT_NAME),
            stored.timestamp,
        )
        .await
        .map_err(ApiError::database("Failed to update contact"))?;

    info!(
        id = stored.id,
        phone = %stored.phone_number,
        direction = %stored.message_type,
        "Message recorded"
    );
    state.hub.publish(LiveEvent::NewMessage(stored.clone()));
    Ok(stored)
}

async fn webhook(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<IncomingMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = record_message(&state, body.validate()?).await?;
    Ok(Json(json!({ "success": true, "message_id": stored.id })))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<IncomingMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = record_message(&state, body.validate()?).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    phone_number: Option<String>,
    #[serde(flatten)]
    page: PageParams,
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let page = query.page.page()?;
    let phone = non_empty(query.phone_number);
    let messages = state
        .conversations
        .list(phone.as_deref(), page)
        .await
        .map_err(ApiError::database("Failed to list conversations"))?;
    Ok(Json(messages))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    let id = parse_id(&id)?;
    state
        .conversations
        .get(id)
        .await
        .map_err(ApiError::database("Failed to load message"))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Message not found"))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<MessagePatch>,
) -> Result<Json<Message>, ApiError> {
    let id = parse_id(&id)?;
    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    let updated = state
        .conversations
        .update(id, &patch)
        .await
        .map_err(ApiError::database("Failed to update message"))?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;

    if patch.status.is_some() {
        state.hub.publish(LiveEvent::StatusUpdate {
            id,
            status: updated.status.clone(),
        });
    }
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: Option<String>,
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let status = require_text("status", body.status)?;
    let found = state
        .conversations
        .set_status(id, &status)
        .await
        .map_err(ApiError::database("Failed to update status"))?;
    if !found {
        return Err(ApiError::not_found("Message not found"));
    }

    info!(id, status = %status, "Message status changed");
    state.hub.publish(LiveEvent::StatusUpdate {
        id,
        status: status.clone(),
    });
    Ok(Json(json!({ "success": true, "id": id, "status": status })))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .conversations
        .delete(id)
        .await
        .map_err(ApiError::database("Failed to delete message"))?;
    if !deleted {
        return Err(ApiError::not_found("Message not found"));
    }
    Ok(Json(json!({ "success": true, "message": "Message deleted" })))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .conversations
        .stats()
        .await
        .map_err(ApiError::database("Failed to load statistics"))?;
    Ok(Json(stats))
}

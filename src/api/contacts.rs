//! Contact routes, keyed by phone number.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use super::error::{ApiError, ApiJson, ApiQuery};
use super::params::{PageParams, non_empty, require_text};
use crate::store::contacts::{Contact, ContactFilter, ContactPatch, NewContact};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/contacts", get(list).post(create))
        .route("/api/contacts/stats", get(stats))
        .route(
            "/api/contacts/{phone_number}",
            get(get_one).put(update).delete(remove),
        )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
    status: Option<String>,
    #[serde(flatten)]
    page: PageParams,
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Contact>>, ApiError> {
    let page = query.page.page()?;
    let filter = ContactFilter {
        search: non_empty(query.search),
        status: non_empty(query.status),
    };
    let contacts = state
        .contacts
        .list(&filter, page)
        .await
        .map_err(ApiError::database("Failed to list contacts"))?;
    Ok(Json(contacts))
}

async fn get_one(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
) -> Result<Json<Contact>, ApiError> {
    state
        .contacts
        .get(&phone_number)
        .await
        .map_err(ApiError::database("Failed to load contact"))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Contact not found"))
}

#[derive(Debug, Deserialize)]
struct CreateContact {
    phone_number: Option<String>,
    name: Option<String>,
    status: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateContact>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewContact {
        phone_number: require_text("phone_number", body.phone_number)?,
        name: non_empty(body.name),
        status: non_empty(body.status),
    };
    let existing = state
        .contacts
        .get(&new.phone_number)
        .await
        .map_err(ApiError::database("Failed to create contact"))?;
    if existing.is_some() {
        return Err(ApiError::bad_request("Contact already exists"));
    }

    let created = state
        .contacts
        .create(&new)
        .await
        .map_err(ApiError::database("Failed to create contact"))?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
    ApiJson(patch): ApiJson<ContactPatch>,
) -> Result<Json<Contact>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    state
        .contacts
        .update(&phone_number, &patch)
        .await
        .map_err(ApiError::database("Failed to update contact"))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Contact not found"))
}

async fn remove(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .contacts
        .delete(&phone_number)
        .await
        .map_err(ApiError::database("Failed to delete contact"))?;
    if !deleted {
        return Err(ApiError::not_found("Contact not found"));
    }
    Ok(Json(json!({ "success": true, "message": "Contact deleted" })))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .contacts
        .stats()
        .await
        .map_err(ApiError::database("Failed to load contact statistics"))?;
    Ok(Json(stats))
}

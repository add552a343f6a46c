//! Lead routes, keyed by UUID.

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
use tracing::info;

use super::AppState;
use super::error::{ApiError, ApiJson, ApiQuery};
use super::params::{PageParams, non_empty, parse_bool, parse_uuid, require_text};
use crate::store::leads::{Lead, LeadFilter, LeadPatch, NewLead};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/leads", get(list).post(create))
        .route("/api/leads/stats", get(stats))
        .route("/api/leads/{id}", get(get_one).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    trava: Option<String>,
    nome: Option<String>,
    #[serde(flatten)]
    page: PageParams,
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    let page = query.page.page()?;
    let filter = LeadFilter {
        trava: parse_bool("trava", query.trava.as_deref())?,
        nome: non_empty(query.nome),
    };
    let leads = state
        .leads
        .list(&filter, page)
        .await
        .map_err(ApiError::database("Failed to list leads"))?;
    Ok(Json(leads))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Lead>, ApiError> {
    let id = parse_uuid(&id)?;
    state
        .leads
        .get(id)
        .await
        .map_err(ApiError::database("Failed to load lead"))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Lead not found"))
}

#[derive(Debug, Deserialize)]
struct CreateLead {
    numero: Option<String>,
    nome: Option<String>,
    followupsequencia: Option<String>,
    followupsequenciamsgid: Option<String>,
    #[serde(default)]
    trava: bool,
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateLead>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewLead {
        numero: require_text("numero", body.numero)?,
        nome: non_empty(body.nome),
        followupsequencia: non_empty(body.followupsequencia),
        followupsequenciamsgid: non_empty(body.followupsequenciamsgid),
        trava: body.trava,
    };
    let created = state
        .leads
        .create(&new, Utc::now())
        .await
        .map_err(ApiError::database("Failed to create lead"))?;
    info!(id = %created.id, numero = %created.numero, "Lead created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<LeadPatch>,
) -> Result<Json<Lead>, ApiError> {
    let id = parse_uuid(&id)?;
    if patch.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    if patch.numero.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("numero cannot be empty"));
    }
    state
        .leads
        .update(id, &patch)
        .await
        .map_err(ApiError::database("Failed to update lead"))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Lead not found"))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid(&id)?;
    let deleted = state
        .leads
        .delete(id)
        .await
        .map_err(ApiError::database("Failed to delete lead"))?;
    if !deleted {
        return Err(ApiError::not_found("Lead not found"));
    }
    Ok(Json(json!({ "success": true, "message": "Lead deleted" })))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .leads
        .stats()
        .await
        .map_err(ApiError::database("Failed to load lead statistics"))?;
    Ok(Json(stats))
}

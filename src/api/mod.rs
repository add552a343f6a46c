//! HTTP surface: REST routes per entity, the live socket, CORS and the JSON
//! 404/405 fallbacks.

pub mod chats;
pub mod contacts;
pub mod conversations;
pub mod error;
pub mod leads;
pub mod params;
pub mod system;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::{Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::live::{self, LiveHub};
use crate::store::{ChatStore, ContactStore, ConversationStore, Database, LeadStore};
use error::ErrorDetails;

/// Shared state for every handler.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<dyn Database>,
    pub conversations: ConversationStore,
    pub contacts: ContactStore,
    pub leads: LeadStore,
    pub chats: ChatStore,
    pub hub: LiveHub,
}

impl AppState {
    pub fn new(config: AppConfig, db: Arc<dyn Database>, hub: LiveHub) -> Self {
        Self {
            config: Arc::new(config),
            conversations: ConversationStore::new(Arc::clone(&db)),
            contacts: ContactStore::new(Arc::clone(&db)),
            leads: LeadStore::new(Arc::clone(&db)),
            chats: ChatStore::new(Arc::clone(&db)),
            db,
            hub,
        }
    }
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let expose_details = state.config.expose_error_details;

    Router::new()
        .merge(system::routes())
        .merge(conversations::routes())
        .merge(contacts::routes())
        .merge(leads::routes())
        .merge(chats::routes())
        .merge(live::ws::routes())
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::map_response_with_state(
            expose_details,
            attach_error_details,
        ))
        .layer(cors())
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

/// Rewrite 500 bodies to include internal detail when the deployment allows it.
async fn attach_error_details(State(expose): State<bool>, response: Response) -> Response {
    if !expose {
        return response;
    }
    let Some(ErrorDetails { message, details }) = response.extensions().get::<ErrorDetails>().cloned()
    else {
        return response;
    };
    let status = response.status();
    (status, Json(json!({ "error": message, "details": details }))).into_response()
}

//! HTTP error mapping and the JSON body and query-string extractors.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::error::DatabaseError;

/// Errors a handler can return. Each maps to one status code and a
/// `{"error": ...}` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// A backend failure while doing `context`.
    #[error("{context}")]
    Database {
        context: &'static str,
        #[source]
        source: DatabaseError,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Wrap a backend error with a short, client-safe description.
    pub fn database(context: &'static str) -> impl FnOnce(DatabaseError) -> Self {
        move |source| Self::Database { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A 500's message plus its internal detail, attached as a response
/// extension. The router's error-detail layer rewrites the body with both
/// when detail exposure is on.
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub message: String,
    pub details: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let body = Json(json!({ "error": message }));
        match self {
            Self::Database { context, source } => {
                error!(error = %source, "{}", context);
                let mut response = (status, body).into_response();
                response.extensions_mut().insert(ErrorDetails {
                    message,
                    details: source.to_string(),
                });
                response
            }
            _ => (status, body).into_response(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

/// `Query` with rejections reported as [`ApiError::BadRequest`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `Json` with rejections reported as [`ApiError::BadRequest`].
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn client_errors_have_error_body() {
        let response = ApiError::bad_request("limit must be a number").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<ErrorDetails>().is_none());
        assert_eq!(body_json(response).await, json!({"error": "limit must be a number"}));
    }

    #[tokio::test]
    async fn database_errors_hide_detail_in_body() {
        let err = ApiError::database("Failed to list leads")(DatabaseError::Query("no such table: leads".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let details = response.extensions().get::<ErrorDetails>().cloned().unwrap();
        assert!(details.details.contains("no such table"));
        assert_eq!(details.message, "Failed to list leads");
        assert_eq!(body_json(response).await, json!({"error": "Failed to list leads"}));
    }
}

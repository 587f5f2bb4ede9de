pub mod documents;
pub mod health;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Settings;
use crate::database::{VectorDB, VectorDBError};
use crate::document::{DocumentError, DocumentProcessor};
use crate::llm::{EmbeddingGenerator, RagChain};

/// Uploads above this size are rejected by the body limit layer.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub processor: Arc<DocumentProcessor>,
    pub vector_db: Arc<VectorDB>,
    pub embeddings: Arc<EmbeddingGenerator>,
    pub rag: Arc<RagChain>,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Two-tier error mapping: expected validation failures surface as 400 with
/// a message; everything else is logged and becomes a generic 500.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(detail) => {
                tracing::warn!(%detail, "request rejected");
                (StatusCode::BAD_REQUEST, Json(ErrorBody { detail })).into_response()
            }
            ApiError::Internal(error) => {
                tracing::error!(error = ?error, "unhandled error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        detail: "Internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal(error)
    }
}

impl From<VectorDBError> for ApiError {
    fn from(error: VectorDBError) -> Self {
        ApiError::Internal(error.into())
    }
}

impl From<DocumentError> for ApiError {
    fn from(error: DocumentError) -> Self {
        if error.is_validation() {
            ApiError::BadRequest(error.to_string())
        } else {
            ApiError::Internal(error.into())
        }
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Create and configure the API router
pub fn create_api(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/documents/upload", post(documents::upload_document))
        .route("/documents/info", get(documents::collection_info))
        .route("/documents/collection", delete(documents::delete_collection))
        .route("/query", post(query::query_documents))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_validation_errors_map_to_400() {
        let response = ApiError::BadRequest("bad file".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unexpected_errors_map_to_500() {
        let response = ApiError::Internal(anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_document_error_mapping_follows_validation_split() {
        let bad = ApiError::from(DocumentError::UnsupportedExtension("png".to_string()));
        assert!(matches!(bad, ApiError::BadRequest(_)));

        let internal = ApiError::from(DocumentError::Pdf("corrupt xref".to_string()));
        assert!(matches!(internal, ApiError::Internal(_)));
    }
}

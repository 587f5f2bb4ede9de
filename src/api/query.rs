use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::{ApiError, ApiResult, AppState};
use crate::llm::{EvaluationScores, SourceDocument};

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,
    #[serde(default = "default_true")]
    pub include_sources: bool,
    #[serde(default)]
    pub include_evaluation: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct SourceSnippet {
    pub content: String,
    pub source: String,
    pub chunk_index: Option<u64>,
    pub score: f32,
}

impl From<&SourceDocument> for SourceSnippet {
    fn from(doc: &SourceDocument) -> Self {
        Self {
            content: doc.preview(),
            source: doc.source.clone(),
            chunk_index: doc.chunk_index,
            score: doc.score,
        }
    }
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceSnippet>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationScores>,
}

/// Answer a question from the ingested documents, optionally with source
/// snippets and evaluation scores.
pub async fn query_documents(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<QueryResponse> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "question must not be blank".to_string(),
        ));
    }

    // Evaluation is opt-in per request and must also be enabled in config.
    let result = if request.include_evaluation && state.rag.evaluation_enabled() {
        state.rag.answer_with_evaluation(&request.question).await?
    } else {
        state.rag.answer_with_sources(&request.question).await?
    };

    let sources = request
        .include_sources
        .then(|| result.sources.iter().map(SourceSnippet::from).collect());

    Ok(Json(QueryResponse {
        answer: result.answer,
        sources,
        evaluation: result.evaluation,
    }))
}

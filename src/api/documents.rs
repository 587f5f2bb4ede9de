use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use crate::api::{ApiError, ApiResult, AppState};

#[derive(Serialize)]
pub struct DocumentUploadResponse {
    pub message: String,
    pub filename: String,
    pub chunks_created: usize,
    pub document_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct CollectionInfoResponse {
    pub collection_name: String,
    pub total_documents: u64,
    pub status: String,
}

#[derive(Serialize)]
pub struct DeleteCollectionResponse {
    pub message: String,
}

/// Upload and ingest a document: load, chunk, embed, upsert.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<DocumentUploadResponse> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("Filename is required".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) = upload
        .ok_or_else(|| ApiError::BadRequest("Multipart field 'file' is required".to_string()))?;

    tracing::info!(%filename, "received upload request");

    let chunks = state.processor.process_upload(data, &filename).await?;

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = state.embeddings.embed_documents(&texts).await?;

    // The collection may have been deleted since startup; recreate on demand.
    let collection = &state.settings.collection_name;
    state
        .vector_db
        .ensure_collection(collection, state.settings.embedding_dimension as u64)
        .await?;
    let document_ids = state
        .vector_db
        .upsert_chunks(collection, &chunks, embeddings)
        .await?;

    tracing::info!(%filename, chunks = chunks.len(), "document ingested");

    Ok(Json(DocumentUploadResponse {
        message: "Document uploaded and processed successfully.".to_string(),
        filename,
        chunks_created: chunks.len(),
        document_ids,
    }))
}

/// Collection statistics. A missing collection reports `not_found` rather
/// than an error.
pub async fn collection_info(State(state): State<AppState>) -> ApiResult<CollectionInfoResponse> {
    let summary = state
        .vector_db
        .collection_summary(&state.settings.collection_name)
        .await?;

    Ok(Json(CollectionInfoResponse {
        collection_name: summary.name,
        total_documents: summary.points_count,
        status: summary.status,
    }))
}

/// Drop the whole collection. Destructive.
pub async fn delete_collection(
    State(state): State<AppState>,
) -> ApiResult<DeleteCollectionResponse> {
    tracing::warn!(
        collection = %state.settings.collection_name,
        "collection deletion requested"
    );
    state
        .vector_db
        .delete_collection(&state.settings.collection_name)
        .await?;

    Ok(Json(DeleteCollectionResponse {
        message: "Collection deleted successfully".to_string(),
    }))
}

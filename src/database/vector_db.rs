use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, with_payload_selector::SelectorOptions, CollectionStatus,
        CreateCollection, Distance, PointId, PointStruct, SearchPoints, UpsertPoints, Value,
        VectorParams, VectorsConfig, WithPayloadSelector,
    },
    Qdrant,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::qdrant_config::create_qdrant_client;
use crate::document::DocumentChunk;

#[derive(Error, Debug)]
pub enum VectorDBError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
    #[error("Got {chunks} chunks but {embeddings} embeddings")]
    CountMismatch { chunks: usize, embeddings: usize },
}

/// One nearest-neighbor search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Summary of a collection for the info endpoint. A missing collection is
/// reported as `not_found`, not as an error.
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub name: String,
    pub points_count: u64,
    pub status: String,
}

#[derive(Clone)]
pub struct VectorDB {
    client: Arc<Qdrant>,
}

impl VectorDB {
    /// Client wired to a local default address without a connection probe.
    /// Lets unit tests build the surrounding services; nothing is contacted
    /// until a request is made.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        let config = qdrant_client::config::QdrantConfig::from_url("http://localhost:6334");
        Self {
            client: Arc::new(Qdrant::new(config).expect("local qdrant config")),
        }
    }

    pub async fn connect(url: &str, api_key: Option<String>) -> Result<Self, VectorDBError> {
        let client = create_qdrant_client(url, api_key)
            .await
            .map_err(|e| VectorDBError::Connection(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create the collection if it does not exist yet.
    pub async fn ensure_collection(
        &self,
        name: &str,
        vector_size: u64,
    ) -> Result<(), VectorDBError> {
        let vectors_config = VectorParams {
            size: vector_size,
            distance: Distance::Cosine.into(),
            ..Default::default()
        };

        let vectors_config = VectorsConfig {
            config: Some(qdrant_client::qdrant::vectors_config::Config::Params(
                vectors_config,
            )),
        };

        let create_collection = CreateCollection {
            collection_name: name.to_string(),
            vectors_config: Some(vectors_config),
            ..Default::default()
        };

        match self.client.create_collection(create_collection).await {
            Ok(_) => {
                log::info!("Collection {} created", name);
                Ok(())
            }
            Err(e) if e.to_string().contains("AlreadyExists") => {
                log::debug!("Collection {} already exists, skipping creation", name);
                Ok(())
            }
            Err(e) => Err(VectorDBError::Operation(e.to_string())),
        }
    }

    /// Upsert one point per chunk and return the generated point ids.
    pub async fn upsert_chunks(
        &self,
        collection: &str,
        chunks: &[DocumentChunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Vec<String>, VectorDBError> {
        if chunks.len() != embeddings.len() {
            return Err(VectorDBError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let mut ids = Vec::with_capacity(chunks.len());
        let mut points = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(embeddings) {
            let point_id = Uuid::new_v4().to_string();

            let payload: HashMap<String, Value> = chunk_payload(chunk)
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect();

            points.push(PointStruct {
                id: Some(PointId {
                    point_id_options: Some(PointIdOptions::Uuid(point_id.clone())),
                }),
                vectors: Some(vector.into()),
                payload,
            });
            ids.push(point_id);
        }

        let upsert_points = UpsertPoints {
            collection_name: collection.to_string(),
            points,
            ..Default::default()
        };

        self.client
            .upsert_points(upsert_points)
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;

        log::info!("Upserted {} points into {}", ids.len(), collection);
        Ok(ids)
    }

    pub async fn search(
        &self,
        collection: &str,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<SearchHit>, VectorDBError> {
        let request = SearchPoints {
            collection_name: collection.to_string(),
            vector: query_vector,
            limit,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let results = match self.client.search_points(request).await {
            Ok(results) => results,
            // Searching an absent collection behaves like an empty one.
            Err(e) if is_not_found(&e.to_string()) => return Ok(Vec::new()),
            Err(e) => return Err(VectorDBError::Operation(e.to_string())),
        };

        let hits = results
            .result
            .into_iter()
            .map(|point| {
                let id = match point.id.and_then(|id| id.point_id_options) {
                    Some(PointIdOptions::Uuid(uuid)) => uuid,
                    Some(PointIdOptions::Num(num)) => num.to_string(),
                    None => String::new(),
                };
                let payload = point
                    .payload
                    .into_iter()
                    .map(|(k, v)| {
                        (
                            k,
                            serde_json::Value::try_from(v).unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect();
                SearchHit {
                    id,
                    score: point.score,
                    payload,
                }
            })
            .collect();

        Ok(hits)
    }

    pub async fn delete_collection(&self, name: &str) -> Result<(), VectorDBError> {
        log::warn!("Deleting collection {}", name);
        self.client
            .delete_collection(name)
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;
        Ok(())
    }

    pub async fn collection_summary(&self, name: &str) -> Result<CollectionSummary, VectorDBError> {
        match self.client.collection_info(name).await {
            Ok(response) => {
                let info = response.result.ok_or_else(|| {
                    VectorDBError::Operation("empty collection info response".to_string())
                })?;
                Ok(CollectionSummary {
                    name: name.to_string(),
                    points_count: info.points_count.unwrap_or(0),
                    status: status_name(info.status).to_string(),
                })
            }
            Err(e) if is_not_found(&e.to_string()) => Ok(CollectionSummary {
                name: name.to_string(),
                points_count: 0,
                status: "not_found".to_string(),
            }),
            Err(e) => Err(VectorDBError::Operation(e.to_string())),
        }
    }

    pub async fn health_check(&self) -> bool {
        match self.client.list_collections().await {
            Ok(_) => true,
            Err(e) => {
                log::error!("Vector store health check failed: {}", e);
                false
            }
        }
    }
}

/// Payload stored alongside each vector.
pub fn chunk_payload(chunk: &DocumentChunk) -> HashMap<String, serde_json::Value> {
    let mut payload = HashMap::new();
    payload.insert(
        "text".to_string(),
        serde_json::Value::String(chunk.text.clone()),
    );
    payload.insert(
        "source".to_string(),
        serde_json::Value::String(chunk.source.clone()),
    );
    payload.insert("chunk_index".to_string(), chunk.chunk_index.into());
    payload.insert(
        "ingested_at".to_string(),
        serde_json::Value::String(chunk.ingested_at.to_rfc3339()),
    );
    payload
}

fn is_not_found(message: &str) -> bool {
    message.contains("NotFound") || message.contains("doesn't exist")
}

fn status_name(status: i32) -> &'static str {
    match CollectionStatus::try_from(status) {
        Ok(CollectionStatus::Green) => "green",
        Ok(CollectionStatus::Yellow) => "yellow",
        Ok(CollectionStatus::Red) => "red",
        Ok(CollectionStatus::Grey) => "grey",
        _ => "unknown",
    }
}

use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client,
};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Inputs per embeddings API request when embedding document chunks.
const BATCH_SIZE: usize = 64;

const QUERY_CACHE_CAPACITY: usize = 256;

/// Text embeddings over the OpenAI API, with a small LRU cache for repeated
/// query strings.
pub struct EmbeddingGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingGenerator {
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimension,
            query_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap(),
            )),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.query_cache.lock().get(text) {
            return Ok(cached.clone());
        }

        let mut embeddings = self.request_embeddings(vec![text.to_string()]).await?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| anyhow!("No embedding returned for query"))?;

        self.query_cache
            .lock()
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            embeddings.extend(self.request_embeddings(batch.to_vec()).await?);
        }
        Ok(embeddings)
    }

    async fn request_embeddings(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = inputs.len();
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(inputs))
            .build()?;

        let response = self.client.embeddings().create(request).await?;
        if response.data.len() != expected {
            return Err(anyhow!(
                "Embeddings API returned {} vectors for {} inputs",
                response.data.len(),
                expected
            ));
        }

        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(expected);
        for item in response.data {
            // The stored vectors must match the collection geometry.
            if item.embedding.len() != self.dimension {
                return Err(anyhow!(
                    "Embedding has dimension {} but the index expects {}",
                    item.embedding.len(),
                    self.dimension
                ));
            }
            embeddings.push(item.embedding);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> EmbeddingGenerator {
        let client = Client::with_config(OpenAIConfig::new().with_api_key("sk-test"));
        EmbeddingGenerator::new(client, "text-embedding-3-small", 1536)
    }

    #[test]
    fn test_dimension_is_exposed() {
        assert_eq!(generator().dimension(), 1536);
    }

    #[test]
    fn test_query_cache_round_trip() {
        let generator = generator();
        generator
            .query_cache
            .lock()
            .put("what is rust?".to_string(), vec![0.5; 1536]);
        let cached = generator.query_cache.lock().get("what is rust?").cloned();
        assert_eq!(cached, Some(vec![0.5; 1536]));
    }

    // Needs a real API key; exercises one embeddings round trip end to end.
    #[tokio::test]
    #[ignore]
    async fn test_live_embedding() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
        let generator = EmbeddingGenerator::new(client, "text-embedding-3-small", 1536);
        let embedding = generator.embed_query("a test sentence").await.unwrap();
        assert_eq!(embedding.len(), 1536);
        assert!(embedding.iter().any(|&x| x != 0.0));
    }
}

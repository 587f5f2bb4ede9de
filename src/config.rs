use anyhow::{anyhow, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default embedding dimension for text-embedding-3-small.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Application settings, loaded once from the environment at startup and
/// shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,

    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub collection_name: String,

    pub chunk_size: usize,
    pub chunk_overlap: usize,

    pub llm_model: String,
    pub llm_temperature: f32,
    pub embedding_model: String,
    pub embedding_dimension: usize,

    pub top_k_retrieval: u64,

    pub enable_evaluation: bool,
    pub evaluation_timeout_secs: u64,
    pub evaluation_llm_model: Option<String>,
    pub evaluation_embedding_model: Option<String>,

    pub api_host: String,
    pub api_port: u16,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY must be set"))?;

        let settings = Self {
            openai_api_key,
            qdrant_url: env_or("QDRANT_URL", "localhost:6334".to_string()),
            qdrant_api_key: env_opt("QDRANT_API_KEY"),
            collection_name: env_or("COLLECTION_NAME", "rag_documents".to_string()),
            chunk_size: env_or("CHUNK_SIZE", 1000),
            chunk_overlap: env_or("CHUNK_OVERLAP", 200),
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini".to_string()),
            llm_temperature: env_or("LLM_TEMPERATURE", 0.0),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small".to_string()),
            embedding_dimension: env_or("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION),
            top_k_retrieval: env_or("TOP_K_RETRIEVAL", 5),
            enable_evaluation: env_or("ENABLE_EVALUATION", true),
            evaluation_timeout_secs: env_or("EVALUATION_TIMEOUT_SECS", 30),
            evaluation_llm_model: env_opt("EVALUATION_LLM_MODEL"),
            evaluation_embedding_model: env_opt("EVALUATION_EMBEDDING_MODEL"),
            api_host: env_or("API_HOST", "0.0.0.0".to_string()),
            api_port: env_or("API_PORT", 8000),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(anyhow!("CHUNK_SIZE must be a positive integer"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(anyhow!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap,
                self.chunk_size
            ));
        }
        if self.embedding_dimension == 0 {
            return Err(anyhow!("EMBEDDING_DIMENSION must be a positive integer"));
        }
        if self.top_k_retrieval == 0 {
            return Err(anyhow!("TOP_K_RETRIEVAL must be a positive integer"));
        }
        Ok(())
    }

    /// Model used by the evaluation judge, falling back to the main LLM.
    pub fn evaluation_llm_model(&self) -> &str {
        self.evaluation_llm_model.as_deref().unwrap_or(&self.llm_model)
    }

    /// Embedding model used for evaluation, falling back to the main one.
    pub fn evaluation_embedding_model(&self) -> &str {
        self.evaluation_embedding_model
            .as_deref()
            .unwrap_or(&self.embedding_model)
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global, so everything that touches them lives in
    // a single test to avoid races between parallel test threads.
    #[test]
    fn test_settings_from_env() {
        env::set_var("OPENAI_API_KEY", "sk-test");
        env::remove_var("CHUNK_SIZE");
        env::remove_var("CHUNK_OVERLAP");
        env::remove_var("EVALUATION_LLM_MODEL");

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.chunk_size, 1000);
        assert_eq!(settings.chunk_overlap, 200);
        assert_eq!(settings.collection_name, "rag_documents");
        assert_eq!(settings.embedding_dimension, 1536);
        assert!(settings.enable_evaluation);
        assert_eq!(settings.evaluation_llm_model(), settings.llm_model);

        env::set_var("CHUNK_SIZE", "500");
        env::set_var("CHUNK_OVERLAP", "50");
        env::set_var("EVALUATION_LLM_MODEL", "gpt-4o");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.chunk_overlap, 50);
        assert_eq!(settings.evaluation_llm_model(), "gpt-4o");

        // Overlap must stay below the chunk size.
        env::set_var("CHUNK_OVERLAP", "500");
        assert!(Settings::from_env().is_err());

        // Unparseable values fall back to defaults rather than erroring.
        env::set_var("CHUNK_OVERLAP", "not-a-number");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.chunk_overlap, 200);

        env::remove_var("CHUNK_SIZE");
        env::remove_var("CHUNK_OVERLAP");
        env::remove_var("EVALUATION_LLM_MODEL");
    }
}

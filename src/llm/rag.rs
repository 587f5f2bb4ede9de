use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::database::{SearchHit, VectorDB};
use crate::llm::embeddings::EmbeddingGenerator;
use crate::llm::evaluation::{EvaluationScores, RagEvaluator};
use crate::providers::CompletionProvider;

/// Canned reply when the context cannot support an answer. The prompt
/// instructs the model to use it, and an empty retrieval returns it without
/// a model round trip.
pub const FALLBACK_ANSWER: &str = "I don't have enough information to answer that question.";

/// Source snippets in responses (and evaluation contexts) are capped at this
/// many characters.
const SOURCE_PREVIEW_CHARS: usize = 500;

/// A retrieved chunk attached to an answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDocument {
    pub content: String,
    pub source: String,
    pub chunk_index: Option<u64>,
    pub score: f32,
}

impl SourceDocument {
    /// Bounded view of the content for responses and evaluation.
    pub fn preview(&self) -> String {
        truncate_chars(&self.content, SOURCE_PREVIEW_CHARS)
    }
}

#[derive(Debug)]
pub struct RagResult {
    pub answer: String,
    pub sources: Vec<SourceDocument>,
    pub evaluation: Option<EvaluationScores>,
}

/// The retrieval-and-generation pipeline: embed the question, search the
/// collection, assemble the context prompt, complete.
pub struct RagChain {
    provider: Arc<dyn CompletionProvider>,
    embeddings: Arc<EmbeddingGenerator>,
    vector_db: Arc<VectorDB>,
    evaluator: Option<Arc<RagEvaluator>>,
    collection_name: String,
    top_k: u64,
}

impl RagChain {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        embeddings: Arc<EmbeddingGenerator>,
        vector_db: Arc<VectorDB>,
        evaluator: Option<Arc<RagEvaluator>>,
        collection_name: impl Into<String>,
        top_k: u64,
    ) -> Self {
        let collection_name = collection_name.into();
        tracing::info!(
            model = provider.model_name(),
            collection = %collection_name,
            top_k,
            evaluation = evaluator.is_some(),
            "RAG chain initialized"
        );
        Self {
            provider,
            embeddings,
            vector_db,
            evaluator,
            collection_name,
            top_k,
        }
    }

    pub fn evaluation_enabled(&self) -> bool {
        self.evaluator.is_some()
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<SourceDocument>> {
        let query_embedding = self.embeddings.embed_query(question).await?;
        let hits = self
            .vector_db
            .search(&self.collection_name, query_embedding, self.top_k)
            .await?;
        Ok(hits.into_iter().filter_map(source_from_hit).collect())
    }

    pub async fn answer(&self, question: &str) -> Result<String> {
        Ok(self.answer_with_sources(question).await?.answer)
    }

    pub async fn answer_with_sources(&self, question: &str) -> Result<RagResult> {
        tracing::info!(question = %truncate_chars(question, 100), "processing query");
        let sources = self.retrieve(question).await?;
        let answer = self.generate(question, &sources).await?;
        Ok(RagResult {
            answer,
            sources,
            evaluation: None,
        })
    }

    /// Like [`answer_with_sources`], additionally scored by the evaluator
    /// when one is configured. Evaluation failure degrades to null scores
    /// inside the result; it never fails the request.
    pub async fn answer_with_evaluation(&self, question: &str) -> Result<RagResult> {
        let mut result = self.answer_with_sources(question).await?;
        if let Some(evaluator) = &self.evaluator {
            let contexts: Vec<String> = result.sources.iter().map(SourceDocument::preview).collect();
            result.evaluation =
                Some(evaluator.evaluate(question, &result.answer, &contexts).await);
        }
        Ok(result)
    }

    pub(crate) async fn generate(
        &self,
        question: &str,
        sources: &[SourceDocument],
    ) -> Result<String> {
        if sources.is_empty() {
            tracing::info!("no relevant context retrieved, returning fallback answer");
            return Ok(FALLBACK_ANSWER.to_string());
        }
        let context = format_context(sources);
        self.provider.complete(&build_prompt(&context, question)).await
    }
}

fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant. Answer the question based on the provided context.\n\n\
         If you cannot answer the question based on the context, say \"{FALLBACK_ANSWER}\"\n\n\
         Do not make up information. Only use the context provided.\n\n\
         Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
    )
}

fn format_context(sources: &[SourceDocument]) -> String {
    sources
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn source_from_hit(hit: SearchHit) -> Option<SourceDocument> {
    let content = hit.payload.get("text")?.as_str()?.to_string();
    let source = hit.payload.get("source")?.as_str()?.to_string();
    let chunk_index = hit.payload.get("chunk_index").and_then(|v| v.as_u64());
    Some(SourceDocument {
        content,
        source,
        chunk_index,
        score: hit.score,
    })
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::{config::OpenAIConfig, Client};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(prompt.to_string())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn chain_with(provider: Arc<EchoProvider>) -> RagChain {
        let client = Client::with_config(OpenAIConfig::new().with_api_key("sk-test"));
        let embeddings = Arc::new(EmbeddingGenerator::new(client, "text-embedding-3-small", 4));
        RagChain::new(
            provider,
            embeddings,
            Arc::new(VectorDB::for_tests()),
            None,
            "rag_documents",
            5,
        )
    }

    fn source(content: &str) -> SourceDocument {
        SourceDocument {
            content: content.to_string(),
            source: "doc.txt".to_string(),
            chunk_index: Some(0),
            score: 0.9,
        }
    }

    #[tokio::test]
    async fn test_empty_retrieval_short_circuits_to_fallback() {
        let provider = Arc::new(EchoProvider {
            calls: AtomicUsize::new(0),
        });
        let chain = chain_with(provider.clone());

        let answer = chain.generate("what is rust?", &[]).await.unwrap();
        assert_eq!(answer, FALLBACK_ANSWER);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_question() {
        let provider = Arc::new(EchoProvider {
            calls: AtomicUsize::new(0),
        });
        let chain = chain_with(provider.clone());

        let sources = vec![source("Rust is a systems language."), source("It has no GC.")];
        let prompt = chain.generate("what is rust?", &sources).await.unwrap();

        assert!(prompt.contains("Rust is a systems language.\n\nIt has no GC."));
        assert!(prompt.contains("Question: what is rust?"));
        assert!(prompt.contains(FALLBACK_ANSWER));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_from_hit() {
        let mut payload = HashMap::new();
        payload.insert("text".to_string(), serde_json::json!("chunk text"));
        payload.insert("source".to_string(), serde_json::json!("doc.pdf"));
        payload.insert("chunk_index".to_string(), serde_json::json!(7));
        let hit = SearchHit {
            id: "abc".to_string(),
            score: 0.42,
            payload,
        };

        let doc = source_from_hit(hit).unwrap();
        assert_eq!(doc.content, "chunk text");
        assert_eq!(doc.source, "doc.pdf");
        assert_eq!(doc.chunk_index, Some(7));
        assert!((doc.score - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_source_from_hit_without_text_is_dropped() {
        let mut payload = HashMap::new();
        payload.insert("source".to_string(), serde_json::json!("doc.pdf"));
        let hit = SearchHit {
            id: "abc".to_string(),
            score: 0.1,
            payload,
        };
        assert!(source_from_hit(hit).is_none());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("0123456789ab", 10), "0123456789...");
        // Multi-byte characters count as single characters.
        assert_eq!(truncate_chars("ééééé", 3), "ééé...");
    }

    #[test]
    fn test_source_preview_caps_length() {
        let doc = source(&"x".repeat(600));
        let preview = doc.preview();
        assert_eq!(preview.chars().count(), 503);
        assert!(preview.ends_with("..."));
    }
}

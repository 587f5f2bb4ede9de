use anyhow::Result;
use async_trait::async_trait;

/// Seam between the RAG pipeline and the chat-completion backend.
///
/// Object-safe so the pipeline and the evaluation judge can be driven by
/// test doubles.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send a single prompt and return the model's reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

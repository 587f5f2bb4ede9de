pub mod embeddings;
pub mod evaluation;
pub mod rag;

pub use embeddings::EmbeddingGenerator;
pub use evaluation::{EvaluationScores, RagEvaluator};
pub use rag::{RagChain, RagResult, SourceDocument, FALLBACK_ANSWER};

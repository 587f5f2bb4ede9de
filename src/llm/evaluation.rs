use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::llm::embeddings::EmbeddingGenerator;
use crate::providers::CompletionProvider;

/// How many probe questions the judge derives from an answer when scoring
/// relevancy.
const GENERATED_QUESTIONS: usize = 3;

/// Answer-quality scores. Evaluation is best-effort: on any failure the
/// scores are null and `error` explains why, but the answer request itself
/// never fails because of it.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationScores {
    pub faithfulness: Option<f32>,
    pub answer_relevancy: Option<f32>,
    pub evaluation_time_ms: Option<u64>,
    pub error: Option<String>,
}

impl EvaluationScores {
    pub fn failed(error: String) -> Self {
        Self {
            faithfulness: None,
            answer_relevancy: None,
            evaluation_time_ms: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatementVerdicts {
    statements: Vec<StatementVerdict>,
}

#[derive(Debug, Deserialize)]
struct StatementVerdict {
    supported: bool,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestions {
    questions: Vec<String>,
}

/// Scores a generated answer against its retrieved context.
///
/// Faithfulness: the judge model decomposes the answer into factual
/// statements and verdicts each one against the context; the score is the
/// supported fraction. Answer relevancy: the judge derives the questions the
/// answer actually addresses, and the score is the mean cosine similarity
/// between their embeddings and the original question's.
pub struct RagEvaluator {
    judge: Arc<dyn CompletionProvider>,
    embeddings: Arc<EmbeddingGenerator>,
    timeout: Duration,
}

impl RagEvaluator {
    pub fn new(
        judge: Arc<dyn CompletionProvider>,
        embeddings: Arc<EmbeddingGenerator>,
        timeout: Duration,
    ) -> Self {
        tracing::info!(
            judge_model = judge.model_name(),
            timeout_secs = timeout.as_secs(),
            "evaluator initialized"
        );
        Self {
            judge,
            embeddings,
            timeout,
        }
    }

    pub async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        contexts: &[String],
    ) -> EvaluationScores {
        let start = Instant::now();
        match tokio::time::timeout(self.timeout, self.run(question, answer, contexts)).await {
            Ok(Ok((faithfulness, answer_relevancy))) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::info!(faithfulness, answer_relevancy, elapsed_ms, "evaluation completed");
                EvaluationScores {
                    faithfulness: Some(faithfulness),
                    answer_relevancy: Some(answer_relevancy),
                    evaluation_time_ms: Some(elapsed_ms),
                    error: None,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "evaluation failed");
                EvaluationScores::failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "evaluation timed out");
                EvaluationScores::failed(format!(
                    "evaluation timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        }
    }

    async fn run(&self, question: &str, answer: &str, contexts: &[String]) -> Result<(f32, f32)> {
        tokio::try_join!(
            self.faithfulness(answer, contexts),
            self.answer_relevancy(question, answer)
        )
    }

    async fn faithfulness(&self, answer: &str, contexts: &[String]) -> Result<f32> {
        let raw = self.judge.complete(&faithfulness_prompt(answer, contexts)).await?;
        let verdicts: StatementVerdicts = parse_json_reply(&raw)?;
        if verdicts.statements.is_empty() {
            return Err(anyhow!("judge returned no statements"));
        }
        let supported = verdicts.statements.iter().filter(|s| s.supported).count();
        Ok(supported as f32 / verdicts.statements.len() as f32)
    }

    async fn answer_relevancy(&self, question: &str, answer: &str) -> Result<f32> {
        let raw = self.judge.complete(&relevancy_prompt(answer)).await?;
        let generated: GeneratedQuestions = parse_json_reply(&raw)?;
        if generated.questions.is_empty() {
            return Err(anyhow!("judge returned no questions"));
        }

        let question_embedding = self.embeddings.embed_query(question).await?;
        let generated_embeddings = self.embeddings.embed_documents(&generated.questions).await?;

        let total: f32 = generated_embeddings
            .iter()
            .map(|g| cosine_similarity(&question_embedding, g))
            .sum();
        Ok(total / generated_embeddings.len() as f32)
    }
}

fn faithfulness_prompt(answer: &str, contexts: &[String]) -> String {
    format!(
        "Break the answer below into its individual factual statements, then decide for \
         each statement whether it can be inferred from the context alone.\n\n\
         Respond with ONLY a JSON object of this exact form:\n\
         {{\"statements\": [{{\"statement\": \"...\", \"supported\": true}}]}}\n\n\
         Context:\n{}\n\nAnswer:\n{}",
        contexts.join("\n\n"),
        answer
    )
}

fn relevancy_prompt(answer: &str) -> String {
    format!(
        "Write {} questions that the answer below would directly and completely answer.\n\n\
         Respond with ONLY a JSON object of this exact form:\n\
         {{\"questions\": [\"...\"]}}\n\nAnswer:\n{}",
        GENERATED_QUESTIONS, answer
    )
}

/// Parse a JSON object out of a model reply, tolerating markdown fences and
/// surrounding prose.
fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

    let body = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end >= start => &trimmed[start..=end],
        _ => trimmed,
    };

    serde_json::from_str(body).map_err(|e| anyhow!("failed to parse judge reply as JSON: {}", e))
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

//! Semantic analysis: sentiment classification and grounded question-answering.

use std::sync::Arc;

use tracing::{debug, warn};

use hearsay_backends::{GenerateParts, GenerativeModel, SentimentScorer};
use hearsay_core::error::{HearsayError, Result};
use hearsay_core::knowledge::KnowledgeStore;
use hearsay_core::types::SentimentResult;

/// Scores text with an external backend and classifies the result.
pub struct SentimentAnalyzer {
    scorer: Arc<dyn SentimentScorer>,
}

impl SentimentAnalyzer {
    pub fn new(scorer: Arc<dyn SentimentScorer>) -> Self {
        Self { scorer }
    }

    /// Classification is a pure function of the backend score; the ±0.25
    /// thresholds live in [`hearsay_core::types::SentimentLabel`].
    pub async fn analyze(&self, text: &str) -> Result<SentimentResult> {
        let score = self.scorer.score(text).await?;
        let result = SentimentResult::from_score(score.score, score.magnitude);
        debug!(
            backend = self.scorer.name(),
            score = score.score,
            magnitude = score.magnitude,
            label = %result.label,
            "Sentiment scored"
        );
        Ok(result)
    }
}

/// Answers questions strictly from the active knowledge source.
pub struct GroundedQa {
    model: Arc<dyn GenerativeModel>,
    knowledge: Arc<KnowledgeStore>,
    max_knowledge_chars: usize,
}

impl GroundedQa {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        knowledge: Arc<KnowledgeStore>,
        max_knowledge_chars: usize,
    ) -> Self {
        Self {
            model,
            knowledge,
            max_knowledge_chars,
        }
    }

    /// Answer `question` from the uploaded document. Fails fast with
    /// [`HearsayError::NoKnowledgeSource`] — no backend call — when nothing
    /// has been ingested yet.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let document = self
            .knowledge
            .snapshot()
            .await
            .ok_or(HearsayError::NoKnowledgeSource)?;

        let bounded = truncate_chars(&document, self.max_knowledge_chars);
        if bounded.len() < document.len() {
            warn!(
                max_chars = self.max_knowledge_chars,
                "Knowledge source truncated for prompt"
            );
        }

        let prompt = build_grounded_prompt(bounded, question);
        let answer = self.model.generate(GenerateParts::text(prompt)).await?;
        Ok(answer.trim().to_string())
    }
}

/// Build the grounded-QA prompt. Instructing the model to answer only from
/// the supplied content is part of the correctness contract: ungrounded
/// answers are a defined failure mode the prompt must guard against.
pub fn build_grounded_prompt(document: &str, question: &str) -> String {
    format!(
        "You are answering questions about a document. Use ONLY the information \
         contained in the document below. If the document does not contain the \
         answer, say that you do not know; do not use outside knowledge.\n\n\
         --- DOCUMENT ---\n{document}\n--- END DOCUMENT ---\n\n\
         Question: {question}"
    )
}

/// Cut `text` to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

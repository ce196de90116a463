//! Generation quality grading.
//!
//! Two independent LLM judges (groundedness and relevance), each reduced
//! to a yes/no verdict by a single normalization function so the
//! default-on-ambiguity policy lives in one testable place.

use anyhow::Result;
use std::sync::Arc;

use crate::llm::LlmProvider;
use crate::prompts;
use crate::types::ConversationHistory;

/// Normalized judge output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
    /// The reply contained neither "yes" nor "no".
    Ambiguous,
}

impl Verdict {
    /// Strict policy: only an explicit yes counts. Ambiguity biases
    /// toward retrying rather than shipping an ungrounded answer.
    pub fn is_affirmative(self) -> bool {
        matches!(self, Verdict::Yes)
    }
}

/// Map free-form judge text onto a verdict. "yes" anywhere wins, then
/// "no"; anything else is ambiguous.
pub fn parse_verdict(raw: &str) -> Verdict {
    let lower = raw.to_lowercase();
    if lower.contains("yes") {
        Verdict::Yes
    } else if lower.contains("no") {
        Verdict::No
    } else {
        Verdict::Ambiguous
    }
}

/// Marker the generator appends before the source list.
pub const SOURCE_BLOCK_MARKER: &str = "\n\nSources:";

/// Drop the trailing source list so the judges evaluate substantive
/// content only, not the citation footer.
pub fn strip_source_block(generation: &str) -> &str {
    match generation.find(SOURCE_BLOCK_MARKER) {
        Some(idx) => &generation[..idx],
        None => generation,
    }
}

/// The two judges behind the grading decision.
pub struct AnswerGraders {
    llm: Arc<dyn LlmProvider>,
}

impl AnswerGraders {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Is the generation supported by the retrieved context and/or the
    /// conversation history?
    pub async fn groundedness(
        &self,
        documents: &str,
        generation: &str,
        history: &ConversationHistory,
    ) -> Result<Verdict> {
        let prompt = prompts::groundedness_prompt(documents, generation, &history.render());
        let raw = self.llm.generate(&prompt).await?;
        let verdict = parse_verdict(&raw);
        tracing::debug!(?verdict, "groundedness judge");
        Ok(verdict)
    }

    /// Does the generation address the question?
    pub async fn relevance(
        &self,
        question: &str,
        generation: &str,
        history: &ConversationHistory,
    ) -> Result<Verdict> {
        let prompt = prompts::relevance_prompt(question, generation, &history.render());
        let raw = self.llm.generate(&prompt).await?;
        let verdict = parse_verdict(&raw);
        tracing::debug!(?verdict, "relevance judge");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_yes_and_no() {
        assert_eq!(parse_verdict("yes"), Verdict::Yes);
        assert_eq!(parse_verdict("No."), Verdict::No);
        assert_eq!(parse_verdict("{\"score\": \"yes\"}"), Verdict::Yes);
        assert_eq!(parse_verdict("{\"score\": \"no\"}"), Verdict::No);
    }

    #[test]
    fn yes_wins_over_no_in_mixed_output() {
        assert_eq!(parse_verdict("Yes, although one could argue no"), Verdict::Yes);
    }

    #[test]
    fn unclear_output_is_ambiguous_and_not_affirmative() {
        let verdict = parse_verdict("I am uncertain about this.");
        assert_eq!(verdict, Verdict::Ambiguous);
        assert!(!verdict.is_affirmative());
    }

    #[test]
    fn verdict_is_case_insensitive() {
        assert_eq!(parse_verdict("YES"), Verdict::Yes);
        assert_eq!(parse_verdict("NO"), Verdict::No);
    }

    #[test]
    fn strips_trailing_source_block() {
        let generation = "X is Y.\n\nSources:\nnotes";
        assert_eq!(strip_source_block(generation), "X is Y.");
    }

    #[test]
    fn leaves_generation_without_sources_untouched() {
        assert_eq!(strip_source_block("X is Y."), "X is Y.");
    }
}

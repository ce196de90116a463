//! Query rewriting.
//!
//! Restates a question so it is clear and self-contained before a retry
//! retrieval pass.

use anyhow::Result;
use std::sync::Arc;

use crate::llm::LlmProvider;
use crate::prompts;

pub struct QueryRewriter {
    llm: Arc<dyn LlmProvider>,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Produce a clearer restatement of `question`. Falls back to the
    /// original question when the model returns nothing.
    pub async fn rewrite(&self, question: &str) -> Result<String> {
        let raw = self.llm.generate(&prompts::rewrite_prompt(question)).await?;
        let rewritten = raw.trim();
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }
}

//! Engine facade exposed to serving layers.
//!
//! One engine instance can serve concurrent requests: it holds only the
//! shared collaborators, and every call constructs its workflow state
//! fresh.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analysis::{AnalysisWorkflow, Dataset, PythonSandbox, SandboxConfig};
use crate::config::AssistantConfig;
use crate::llm::LlmProvider;
use crate::qa::QaWorkflow;
use crate::retrieval::Retriever;
use crate::types::{AnalysisAnswer, ConversationHistory, QaAnswer};

pub struct AssistantEngine {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmProvider>,
    config: AssistantConfig,
}

impl AssistantEngine {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LlmProvider>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            retriever,
            llm,
            config,
        }
    }

    /// Answer a question against the indexed documents. `history` is
    /// bounded to the configured window before the workflow sees it.
    pub async fn run_qa(&self, question: &str, history: ConversationHistory) -> Result<QaAnswer> {
        let started_at = Utc::now();
        let started = Instant::now();

        let history = history.bounded(self.config.qa.history_window);
        let workflow = QaWorkflow::new(
            self.retriever.clone(),
            self.llm.clone(),
            self.config.qa.clone(),
            self.config.retrieval.top_k,
        );
        let answer = workflow.run(question, history).await?;

        tracing::info!(
            %started_at,
            duration_ms = started.elapsed().as_millis() as u64,
            sources = answer.source_files.len(),
            "qa request complete"
        );
        Ok(answer)
    }

    /// Run the exploratory-analysis pipeline against the configured
    /// dataset.
    pub async fn run_data_analysis(&self, question: &str) -> Result<AnalysisAnswer> {
        let started_at = Utc::now();
        let started = Instant::now();

        let dataset = Dataset::load(
            &self.config.analysis.dataset_path,
            self.config.analysis.sample_values_per_column,
        )?;
        let sandbox = Arc::new(PythonSandbox::new(SandboxConfig {
            python_bin: self.config.analysis.python_bin.clone(),
            timeout: Duration::from_secs(self.config.analysis.timeout_secs),
            max_output_bytes: self.config.analysis.max_output_bytes,
        }));
        let workflow = AnalysisWorkflow::new(self.llm.clone(), sandbox);
        let answer = workflow.run(question, &dataset).await?;

        tracing::info!(
            %started_at,
            duration_ms = started.elapsed().as_millis() as u64,
            "analysis request complete"
        );
        Ok(answer)
    }
}

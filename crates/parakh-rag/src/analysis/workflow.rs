//! The data-analysis pipeline: plan → generate code → execute →
//! interpret.
//!
//! Strictly linear; each stage's output becomes the next stage's input.
//! There is no retry loop: malformed plans degrade to raw text, and
//! failed executions flow into interpretation as captured error text.

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use super::dataset::Dataset;
use super::sandbox::{CodeSandbox, SandboxOutput};
use super::table::{parse_table, TableData};
use crate::llm::{generate_with_stream_fallback, LlmProvider};
use crate::prompts;
use crate::types::AnalysisAnswer;

static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*```[\w-]*\s*$").expect("code fence regex is valid")
});
static STEP_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+[.)]|[-*])\s+(.+)$").expect("step line regex is valid")
});

/// Ordered plan steps, with the raw model text kept for downstream
/// prompts when no structure could be parsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<String>,
    pub raw: String,
}

impl Plan {
    /// Parse the model's plan output: a JSON list of strings (optionally
    /// fenced), else numbered or bulleted lines, else the raw text with
    /// no structured steps. Never fails.
    pub fn parse(raw: &str) -> Self {
        let cleaned = strip_code_fences(raw);
        if let Some(steps) = parse_json_steps(&cleaned) {
            return Self {
                steps,
                raw: raw.to_string(),
            };
        }
        let steps: Vec<String> = cleaned
            .lines()
            .filter_map(|line| STEP_LINE_RE.captures(line).map(|c| c[1].trim().to_string()))
            .collect();
        Self {
            steps,
            raw: raw.to_string(),
        }
    }

    pub fn is_structured(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Render for downstream prompts: structured steps as a numbered
    /// list, otherwise the raw text.
    pub fn render(&self) -> String {
        if self.steps.is_empty() {
            self.raw.clone()
        } else {
            self.steps
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {}", i + 1, step))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

fn parse_json_steps(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    let steps: Vec<String> = serde_json::from_str(&text[start..=end]).ok()?;
    let steps: Vec<String> = steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if steps.is_empty() {
        None
    } else {
        Some(steps)
    }
}

/// Remove markdown code fences and a leading language tag.
pub fn strip_code_fences(code: &str) -> String {
    let stripped = CODE_FENCE_RE.replace_all(code, "");
    let mut lines: Vec<&str> = stripped.trim().lines().collect();
    if let Some(first) = lines.first() {
        if first.trim().eq_ignore_ascii_case("python") {
            lines.remove(0);
        }
    }
    lines.join("\n").trim().to_string()
}

/// Fixed preamble binding the dataset to the `df` handle the generated
/// code is instructed to use. Plotting handles degrade to None when the
/// plotting stack is absent; pandas and numpy are hard requirements.
pub fn dataset_preamble(path: &Path) -> String {
    format!(
        concat!(
            "import pandas as pd\n",
            "import numpy as np\n",
            "try:\n",
            "    import matplotlib\n",
            "    matplotlib.use(\"Agg\")\n",
            "    import matplotlib.pyplot as plt\n",
            "    import seaborn as sns\n",
            "except ImportError:\n",
            "    plt = None\n",
            "    sns = None\n",
            "df = pd.read_csv(r\"{}\")\n",
        ),
        path.display()
    )
}

/// Output kind tag for the captured execution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Text,
    Table,
}

/// Structured result of running the generated code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub kind: OutputKind,
    pub output: String,
    pub table: Option<TableData>,
}

impl ExecutionResult {
    /// Tag captured output as tabular when it parses as a delimited
    /// table; error output is always plain text.
    pub fn from_captured(captured: &SandboxOutput) -> Self {
        if captured.success {
            if let Some(table) = parse_table(&captured.output) {
                return Self {
                    kind: OutputKind::Table,
                    output: captured.output.clone(),
                    table: Some(table),
                };
            }
        }
        Self {
            kind: OutputKind::Text,
            output: captured.output.clone(),
            table: None,
        }
    }
}

/// Record threaded through the linear pipeline.
#[derive(Debug, Default)]
pub struct AnalysisState {
    /// Immutable original user question.
    pub question: String,
    pub plan: Plan,
    pub code: String,
    pub execution_result: Option<ExecutionResult>,
    pub generation: String,
}

impl AnalysisState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

/// Returned when interpretation produced no text at all.
pub const EMPTY_ANALYSIS_FALLBACK: &str =
    "I'm sorry, I was unable to produce an analysis for this question.";

pub struct AnalysisWorkflow {
    llm: Arc<dyn LlmProvider>,
    sandbox: Arc<dyn CodeSandbox>,
}

impl AnalysisWorkflow {
    pub fn new(llm: Arc<dyn LlmProvider>, sandbox: Arc<dyn CodeSandbox>) -> Self {
        Self { llm, sandbox }
    }

    /// Run the linear pipeline against `dataset`. State lives only for
    /// this call.
    pub async fn run(&self, question: &str, dataset: &Dataset) -> Result<AnalysisAnswer> {
        let mut state = AnalysisState::new(question);
        tracing::info!(question = %state.question, "analysis workflow start");

        self.plan(&mut state, dataset).await?;
        self.generate_code(&mut state, dataset).await?;
        self.execute_code(&mut state).await;
        self.analyze_results(&mut state, dataset).await?;

        Ok(AnalysisAnswer {
            answer: state.generation,
        })
    }

    async fn plan(&self, state: &mut AnalysisState, dataset: &Dataset) -> Result<()> {
        let started = Instant::now();
        let prompt = prompts::planning_prompt(
            &state.question,
            &dataset.column_names_joined(),
            &dataset.describe_types(),
        );
        let raw = self.llm.generate(&prompt).await?;
        let plan = Plan::parse(&raw);
        if !plan.is_structured() {
            tracing::warn!("plan output was not a structured list, keeping raw text");
        }
        tracing::info!(
            steps = plan.steps.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "plan complete"
        );
        state.plan = plan;
        Ok(())
    }

    async fn generate_code(&self, state: &mut AnalysisState, dataset: &Dataset) -> Result<()> {
        let started = Instant::now();
        let prompt = prompts::code_prompt(
            &dataset.path().display().to_string(),
            dataset.shape(),
            &dataset.column_names_joined(),
            &dataset.describe_types(),
            &dataset.describe_samples(),
            &state.question,
            &state.plan.render(),
        );
        let raw = self.llm.generate(&prompt).await?;
        let body = strip_code_fences(&raw);
        state.code = format!("{}{}", dataset_preamble(dataset.path()), body);
        tracing::info!(
            code_bytes = state.code.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "code generation complete"
        );
        Ok(())
    }

    async fn execute_code(&self, state: &mut AnalysisState) {
        let captured = self.sandbox.run(&state.code).await;
        if !captured.success {
            tracing::warn!(
                duration_ms = captured.duration_ms,
                "generated code failed, error text captured for interpretation"
            );
        }
        let result = ExecutionResult::from_captured(&captured);
        tracing::info!(
            kind = ?result.kind,
            output_bytes = result.output.len(),
            duration_ms = captured.duration_ms,
            "execution complete"
        );
        state.execution_result = Some(result);
    }

    async fn analyze_results(&self, state: &mut AnalysisState, dataset: &Dataset) -> Result<()> {
        let started = Instant::now();
        let output = state
            .execution_result
            .as_ref()
            .map(|r| r.output.as_str())
            .unwrap_or("");
        let prompt = prompts::interpretation_prompt(
            &state.question,
            &state.plan.render(),
            output,
            &dataset.column_names_joined(),
        );
        let raw = generate_with_stream_fallback(self.llm.as_ref(), &prompt).await?;
        state.generation = if raw.trim().is_empty() {
            EMPTY_ANALYSIS_FALLBACK.to_string()
        } else {
            raw
        };
        tracing::info!(
            duration_ms = started.elapsed().as_millis() as u64,
            "interpretation complete"
        );
        Ok(())
    }
}

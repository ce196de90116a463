//! The LLM-driven exploratory data-analysis pipeline.

pub mod dataset;
pub mod sandbox;
pub mod table;
pub mod workflow;

pub use dataset::{Column, ColumnType, Dataset, DatasetError};
pub use sandbox::{CodeSandbox, PythonSandbox, SandboxConfig, SandboxOutput};
pub use table::TableData;
pub use workflow::{
    AnalysisState, AnalysisWorkflow, ExecutionResult, OutputKind, Plan, EMPTY_ANALYSIS_FALLBACK,
};

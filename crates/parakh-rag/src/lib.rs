pub mod analysis;
pub mod config;
pub mod engine;
pub mod grading;
pub mod llm;
pub mod prompts;
pub mod qa;
pub mod retrieval;
pub mod rewrite;
pub mod sources;
pub mod types;

// Re-export primary types for convenience
pub use config::AssistantConfig;
pub use engine::AssistantEngine;
pub use retrieval::Retriever;
pub use types::{
    AnalysisAnswer, ConversationHistory, ConversationTurn, Passage, PassageMetadata, QaAnswer,
};

// Re-export LLM gateway types
pub use llm::{ApiProvider, ExternalProvider, GenerationConfig, LlmProvider, TokenStream};

// Re-export common types
pub use anyhow::{Error, Result};
pub use uuid::Uuid;

//! The self-correcting question-answering workflow.

pub mod state;
pub mod workflow;

pub use state::QaState;
pub use workflow::{Decision, QaEvent, QaPhase, QaWorkflow, EMPTY_GENERATION_FALLBACK};

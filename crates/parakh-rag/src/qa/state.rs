use std::time::{Duration, Instant};

use crate::types::{ConversationHistory, Passage};

/// Mutable record threaded through every node of one QA run.
#[derive(Debug)]
pub struct QaState {
    /// Current query text; replaced by the rewrite step, immutable
    /// elsewhere.
    pub question: String,
    /// Latest candidate answer, source block appended; overwritten on
    /// each retry.
    pub generation: String,
    /// Passages from the most recent retrieval pass; replaced wholesale
    /// each time, never stale relative to `question`.
    pub documents: Vec<Passage>,
    /// Caller-supplied prior exchanges; read-only here.
    pub conversation_history: ConversationHistory,
    /// Rewrite counter; grading forces acceptance at the ceiling.
    pub recursion_count: u32,
    /// Step-duration instrumentation only, not part of the contract.
    pub last_step_time: Instant,
}

impl QaState {
    /// Entry-point initialization: fresh documents, zeroed counter.
    pub fn new(question: impl Into<String>, history: ConversationHistory) -> Self {
        Self {
            question: question.into(),
            generation: String::new(),
            documents: Vec::new(),
            conversation_history: history,
            recursion_count: 0,
            last_step_time: Instant::now(),
        }
    }

    /// Record a step boundary, returning the time since the previous one.
    pub fn mark_step(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.last_step_time;
        self.last_step_time = now;
        elapsed
    }
}

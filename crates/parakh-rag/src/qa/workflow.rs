//! The self-correcting QA control loop.
//!
//! Coordinates retrieve → generate → grade, with a bounded
//! rewrite-and-retry cycle when the generation is judged ungrounded or
//! off-topic. The machine is an explicit phase enum driven by a total
//! transition function, so routing is testable without any model.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use super::state::QaState;
use crate::config::QaConfig;
use crate::grading::{strip_source_block, AnswerGraders};
use crate::llm::{generate_with_stream_fallback, LlmProvider};
use crate::prompts;
use crate::retrieval::Retriever;
use crate::rewrite::QueryRewriter;
use crate::sources::{format_source_block, unique_source_stems};
use crate::types::{ConversationHistory, QaAnswer};

/// Routing decision produced by the grading step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Useful,
    NotUseful,
}

/// Nodes of the QA state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaPhase {
    Entry,
    Retrieve,
    Generate,
    TransformQuery,
    Done,
}

/// Events that drive transitions between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaEvent {
    Initialized,
    Retrieved,
    Graded(Decision),
    Rewritten,
}

impl QaPhase {
    /// Total transition function. An event that does not apply to the
    /// current phase leaves the machine where it is.
    pub fn next(self, event: QaEvent) -> QaPhase {
        match (self, event) {
            (QaPhase::Entry, QaEvent::Initialized) => QaPhase::Retrieve,
            (QaPhase::Retrieve, QaEvent::Retrieved) => QaPhase::Generate,
            (QaPhase::Generate, QaEvent::Graded(Decision::Useful)) => QaPhase::Done,
            (QaPhase::Generate, QaEvent::Graded(Decision::NotUseful)) => QaPhase::TransformQuery,
            (QaPhase::TransformQuery, QaEvent::Rewritten) => QaPhase::Retrieve,
            (phase, _) => phase,
        }
    }
}

/// Substituted when the gateway yields no text, so grading never sees an
/// empty answer.
pub const EMPTY_GENERATION_FALLBACK: &str = "I could not generate a response.";

pub struct QaWorkflow {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmProvider>,
    graders: AnswerGraders,
    rewriter: QueryRewriter,
    config: QaConfig,
    top_k: usize,
}

impl QaWorkflow {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LlmProvider>,
        config: QaConfig,
        top_k: usize,
    ) -> Self {
        Self {
            graders: AnswerGraders::new(llm.clone()),
            rewriter: QueryRewriter::new(llm.clone()),
            retriever,
            llm,
            config,
            top_k,
        }
    }

    /// Run the full loop for one question. All state lives only for the
    /// duration of this call.
    pub async fn run(&self, question: &str, history: ConversationHistory) -> Result<QaAnswer> {
        let mut state = QaState::new(question, history);
        tracing::info!(question = %state.question, "qa workflow start");

        let mut phase = QaPhase::Entry;
        loop {
            match phase {
                QaPhase::Entry => {
                    phase = phase.next(QaEvent::Initialized);
                }
                QaPhase::Retrieve => {
                    self.retrieve(&mut state).await?;
                    phase = phase.next(QaEvent::Retrieved);
                }
                QaPhase::Generate => {
                    self.generate(&mut state).await?;
                    let decision = self.grade(&state).await?;
                    phase = phase.next(QaEvent::Graded(decision));
                }
                QaPhase::TransformQuery => {
                    self.transform_query(&mut state).await?;
                    phase = phase.next(QaEvent::Rewritten);
                }
                QaPhase::Done => break,
            }
        }

        let source_files = unique_source_stems(&state.documents);
        Ok(QaAnswer {
            answer: state.generation,
            source_files,
        })
    }

    async fn retrieve(&self, state: &mut QaState) -> Result<()> {
        let since_last = state.mark_step();
        let started = Instant::now();
        let documents = self.retriever.query(&state.question, self.top_k).await?;
        tracing::info!(
            passages = documents.len(),
            since_last_ms = since_last.as_millis() as u64,
            duration_ms = started.elapsed().as_millis() as u64,
            "retrieve complete"
        );
        state.documents = documents;
        Ok(())
    }

    async fn generate(&self, state: &mut QaState) -> Result<()> {
        state.mark_step();
        let started = Instant::now();

        let document_text: String = state.documents.iter().map(|p| p.content.as_str()).collect();
        let prompt = prompts::generator_prompt(
            &state.conversation_history.render(),
            &document_text,
            &state.question,
        );
        let response = generate_with_stream_fallback(self.llm.as_ref(), &prompt).await?;

        let mut generation = if response.trim().is_empty() {
            EMPTY_GENERATION_FALLBACK.to_string()
        } else {
            response
        };

        let source_block = format_source_block(&state.documents);
        if !source_block.is_empty() {
            generation.push_str("\n\n");
            generation.push_str(&source_block);
        }

        tracing::info!(
            duration_ms = started.elapsed().as_millis() as u64,
            "generate complete"
        );
        state.generation = generation;
        Ok(())
    }

    /// Grading decision: ceiling check first, then groundedness, then
    /// relevance; judge ambiguity counts as "no".
    async fn grade(&self, state: &QaState) -> Result<Decision> {
        if state.recursion_count >= self.config.max_rewrites {
            tracing::info!(
                recursion_count = state.recursion_count,
                "retry budget exhausted, forcing acceptance"
            );
            return Ok(Decision::Useful);
        }

        let documents_text = state
            .documents
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let generation = strip_source_block(&state.generation);

        let grounded = self
            .graders
            .groundedness(&documents_text, generation, &state.conversation_history)
            .await?;
        if !grounded.is_affirmative() {
            tracing::info!(?grounded, "generation failed groundedness check");
            return Ok(Decision::NotUseful);
        }

        let relevant = self
            .graders
            .relevance(&state.question, generation, &state.conversation_history)
            .await?;
        let decision = if relevant.is_affirmative() {
            Decision::Useful
        } else {
            Decision::NotUseful
        };
        tracing::info!(?relevant, ?decision, "grading complete");
        Ok(decision)
    }

    async fn transform_query(&self, state: &mut QaState) -> Result<()> {
        state.mark_step();
        let rewritten = self.rewriter.rewrite(&state.question).await?;
        tracing::info!(
            original = %state.question,
            rewritten = %rewritten,
            recursion_count = state.recursion_count + 1,
            "query transformed"
        );
        state.question = rewritten;
        state.recursion_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ProviderInfo, TokenStream};
    use crate::types::{ConversationTurn, Passage};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<VecDeque<String>>,
        fail_streams: bool,
    }

    impl ScriptedLlm {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                fail_streams: false,
            }
        }

        fn without_streaming(responses: &[&str]) -> Self {
            Self {
                fail_streams: true,
                ..Self::new(responses)
            }
        }

        fn remaining(&self) -> usize {
            self.responses.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl crate::llm::LlmProvider for ScriptedLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("script exhausted"))
        }

        async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
            if self.fail_streams {
                return Err(anyhow!("stream unavailable"));
            }
            let text = self.generate(prompt).await?;
            let (tx, rx) = tokio::sync::mpsc::channel(4);
            let _ = tx.try_send(text);
            Ok(TokenStream::new(rx))
        }

        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "scripted".to_string(),
                model: "scripted".to_string(),
                context_window: 4096,
                supports_streaming: true,
                is_local: true,
            }
        }

        async fn is_ready(&self) -> bool {
            true
        }
    }

    struct StaticRetriever {
        passages: Vec<Passage>,
        queries: Mutex<Vec<String>>,
    }

    impl StaticRetriever {
        fn new(passages: Vec<Passage>) -> Self {
            Self {
                passages,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn query_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Retriever for StaticRetriever {
        async fn query(&self, query: &str, _k: usize) -> Result<Vec<Passage>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.passages.clone())
        }
    }

    fn workflow(
        retriever: Arc<StaticRetriever>,
        llm: Arc<ScriptedLlm>,
    ) -> QaWorkflow {
        let config = QaConfig {
            max_rewrites: 2,
            history_window: 3,
        };
        QaWorkflow::new(retriever, llm, config, 3)
    }

    #[test]
    fn phase_transitions_follow_the_graph() {
        assert_eq!(QaPhase::Entry.next(QaEvent::Initialized), QaPhase::Retrieve);
        assert_eq!(QaPhase::Retrieve.next(QaEvent::Retrieved), QaPhase::Generate);
        assert_eq!(
            QaPhase::Generate.next(QaEvent::Graded(Decision::Useful)),
            QaPhase::Done
        );
        assert_eq!(
            QaPhase::Generate.next(QaEvent::Graded(Decision::NotUseful)),
            QaPhase::TransformQuery
        );
        assert_eq!(
            QaPhase::TransformQuery.next(QaEvent::Rewritten),
            QaPhase::Retrieve
        );
    }

    #[test]
    fn inapplicable_events_do_not_move_the_machine() {
        assert_eq!(QaPhase::Retrieve.next(QaEvent::Rewritten), QaPhase::Retrieve);
        assert_eq!(QaPhase::Done.next(QaEvent::Initialized), QaPhase::Done);
        assert_eq!(
            QaPhase::Entry.next(QaEvent::Graded(Decision::Useful)),
            QaPhase::Entry
        );
    }

    #[tokio::test]
    async fn grounded_answer_is_accepted_on_the_first_pass() {
        let retriever = Arc::new(StaticRetriever::new(vec![Passage::new(
            "X is defined as Y",
            "files/notes.md",
            "notes.md",
        )]));
        let llm = Arc::new(ScriptedLlm::new(&["X is Y", "yes", "yes"]));
        let wf = workflow(retriever.clone(), llm.clone());

        let answer = wf
            .run("what is X", ConversationHistory::default())
            .await
            .unwrap();

        assert_eq!(answer.answer, "X is Y\n\nSources:\nnotes");
        assert_eq!(answer.source_files, vec!["notes"]);
        assert_eq!(retriever.query_count(), 1);
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn ungrounded_answer_triggers_rewrite_and_retry() {
        let retriever = Arc::new(StaticRetriever::new(vec![Passage::new(
            "X is defined as Y",
            "files/notes.md",
            "notes.md",
        )]));
        let llm = Arc::new(ScriptedLlm::new(&[
            "unsupported claim",
            "no",
            "what is X exactly",
            "X is Y",
            "yes",
            "yes",
        ]));
        let wf = workflow(retriever.clone(), llm.clone());

        let answer = wf
            .run("what is X", ConversationHistory::default())
            .await
            .unwrap();

        assert_eq!(retriever.query_count(), 2);
        let queries = retriever.queries.lock().unwrap().clone();
        assert_eq!(queries[1], "what is X exactly");
        assert!(answer.answer.starts_with("X is Y"));
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn retry_budget_forces_acceptance_after_two_rewrites() {
        let retriever = Arc::new(StaticRetriever::new(vec![Passage::new(
            "X is defined as Y",
            "files/notes.md",
            "notes.md",
        )]));
        // Judges always say no; the third generation must be accepted
        // without consulting them again.
        let llm = Arc::new(ScriptedLlm::new(&[
            "first attempt",
            "no",
            "rewrite one",
            "second attempt",
            "no",
            "rewrite two",
            "third attempt",
        ]));
        let wf = workflow(retriever.clone(), llm.clone());

        let answer = wf
            .run("what is X", ConversationHistory::default())
            .await
            .unwrap();

        assert_eq!(retriever.query_count(), 3);
        assert!(answer.answer.starts_with("third attempt"));
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn empty_generation_is_replaced_before_grading() {
        let retriever = Arc::new(StaticRetriever::new(vec![Passage::new(
            "X is defined as Y",
            "files/notes.md",
            "notes.md",
        )]));
        let llm = Arc::new(ScriptedLlm::without_streaming(&["", "yes", "yes"]));
        let wf = workflow(retriever, llm);

        let answer = wf
            .run("what is X", ConversationHistory::default())
            .await
            .unwrap();

        assert!(answer.answer.starts_with(EMPTY_GENERATION_FALLBACK));
    }

    #[tokio::test]
    async fn conversation_history_is_accepted() {
        let retriever = Arc::new(StaticRetriever::new(vec![Passage::new(
            "Z follows from X",
            "files/notes.md",
            "notes.md",
        )]));
        let llm = Arc::new(ScriptedLlm::new(&["Z follows", "yes", "yes"]));
        let wf = workflow(retriever, llm);

        let history = ConversationHistory::new(vec![ConversationTurn::new("what is X", "X is Y")]);
        let answer = wf.run("and Z?", history).await.unwrap();
        assert!(answer.answer.starts_with("Z follows"));
    }

    #[tokio::test]
    async fn no_retrieved_passages_yields_answer_without_sources() {
        let retriever = Arc::new(StaticRetriever::new(Vec::new()));
        let llm = Arc::new(ScriptedLlm::new(&["nothing in the corpus", "yes", "yes"]));
        let wf = workflow(retriever, llm);

        let answer = wf
            .run("what is X", ConversationHistory::default())
            .await
            .unwrap();

        assert_eq!(answer.answer, "nothing in the corpus");
        assert!(answer.source_files.is_empty());
    }
}

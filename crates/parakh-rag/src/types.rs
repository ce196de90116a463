use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A retrieved unit of document text plus provenance metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub metadata: PassageMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// Path of the source file the passage was extracted from.
    pub source_file: String,
    /// Display name of the file, extension included.
    pub file_name: String,
}

impl Passage {
    pub fn new(
        content: impl Into<String>,
        source_file: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            metadata: PassageMetadata {
                source_file: source_file.into(),
                file_name: file_name.into(),
            },
        }
    }
}

/// One prior exchange supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Ordered prior exchanges, most recent last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory(Vec<ConversationTurn>);

impl ConversationHistory {
    pub fn new(turns: Vec<ConversationTurn>) -> Self {
        Self(turns)
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lenient construction from caller-supplied JSON. Anything that is
    /// not an array degrades to an empty history; entries may be
    /// `{question, answer}` objects or `[question, answer]` pairs, and
    /// entries of any other shape are skipped.
    pub fn from_value(value: &Value) -> Self {
        let Some(items) = value.as_array() else {
            return Self::default();
        };

        let mut turns = Vec::new();
        for item in items {
            let turn = match item {
                Value::Array(pair) if pair.len() == 2 => {
                    match (pair[0].as_str(), pair[1].as_str()) {
                        (Some(q), Some(a)) => Some(ConversationTurn::new(q, a)),
                        _ => None,
                    }
                }
                Value::Object(map) => {
                    let question = map.get("question").and_then(Value::as_str);
                    let answer = map.get("answer").and_then(Value::as_str);
                    match (question, answer) {
                        (Some(q), Some(a)) => Some(ConversationTurn::new(q, a)),
                        _ => None,
                    }
                }
                _ => None,
            };
            if let Some(turn) = turn {
                turns.push(turn);
            }
        }
        Self(turns)
    }

    /// Keep only the most recent `n` exchanges.
    pub fn bounded(mut self, n: usize) -> Self {
        if self.0.len() > n {
            self.0 = self.0.split_off(self.0.len() - n);
        }
        self
    }

    /// Render the history for inclusion in a prompt. Empty history
    /// renders as an empty string.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|t| format!("User: {}\nAssistant: {}", t.question, t.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Final QA result returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    /// Unique source file stems cited by the answer, first-seen order.
    pub source_files: Vec<String>,
}

/// Final data-analysis result returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisAnswer {
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_from_pairs() {
        let value = json!([["what is x", "x is y"], ["and z", "z is w"]]);
        let history = ConversationHistory::from_value(&value);
        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[0].question, "what is x");
        assert_eq!(history.turns()[1].answer, "z is w");
    }

    #[test]
    fn history_from_objects() {
        let value = json!([{"question": "q", "answer": "a"}]);
        let history = ConversationHistory::from_value(&value);
        assert_eq!(history.turns(), &[ConversationTurn::new("q", "a")]);
    }

    #[test]
    fn malformed_history_degrades_to_empty() {
        assert!(ConversationHistory::from_value(&json!("not a list")).is_empty());
        assert!(ConversationHistory::from_value(&json!({"q": "a"})).is_empty());
        assert!(ConversationHistory::from_value(&json!(42)).is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let value = json!([["q", "a"], "junk", [1, 2], {"question": "only"}]);
        let history = ConversationHistory::from_value(&value);
        assert_eq!(history.len(), 1);
        assert_eq!(history.turns()[0].question, "q");
    }

    #[test]
    fn bounded_keeps_most_recent() {
        let history = ConversationHistory::new(vec![
            ConversationTurn::new("q1", "a1"),
            ConversationTurn::new("q2", "a2"),
            ConversationTurn::new("q3", "a3"),
        ]);
        let bounded = history.bounded(2);
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded.turns()[0].question, "q2");
        assert_eq!(bounded.turns()[1].question, "q3");
    }

    #[test]
    fn render_empty_history() {
        assert_eq!(ConversationHistory::default().render(), "");
    }
}

//! Language-model gateway.
//!
//! Everything in the pipelines talks to a text-generation backend
//! through [`LlmProvider`]; streaming is an optimization and every
//! caller keeps a blocking fallback via
//! [`generate_with_stream_fallback`].

pub mod external;
pub mod streaming;

pub use external::ExternalProvider;
pub use streaming::TokenStream;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where completions come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiProvider {
    /// Local Ollama server, OpenAI-compatible endpoint.
    Ollama,
    OpenAI,
    /// Any other OpenAI-compatible chat-completions endpoint.
    Custom { endpoint: String },
}

/// Generation parameters shared by blocking and streaming calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.0,
            top_p: 0.95,
        }
    }
}

/// Provider information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub context_window: usize,
    pub supports_streaming: bool,
    pub is_local: bool,
}

/// Core trait for text-generation backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Blocking completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Streaming completion for `prompt`. Callers must not assume this
    /// succeeds; see [`generate_with_stream_fallback`].
    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream>;

    /// Get provider info.
    fn info(&self) -> ProviderInfo;

    /// Check if the provider is ready.
    async fn is_ready(&self) -> bool;
}

/// Attempt streaming first and fall back to a single blocking call when
/// the stream cannot be opened or dies before producing any text.
pub async fn generate_with_stream_fallback(llm: &dyn LlmProvider, prompt: &str) -> Result<String> {
    match llm.generate_stream(prompt).await {
        Ok(stream) => {
            let text = stream.collect().await;
            if text.is_empty() {
                tracing::debug!("stream produced no fragments, falling back to blocking call");
                llm.generate(prompt).await
            } else {
                Ok(text)
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "streaming failed, falling back to blocking call");
            llm.generate(prompt).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use tokio::sync::mpsc;

    struct FixtureLlm {
        blocking: String,
        stream_fragments: Option<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for FixtureLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.blocking.clone())
        }

        async fn generate_stream(&self, _prompt: &str) -> Result<TokenStream> {
            let Some(fragments) = &self.stream_fragments else {
                return Err(anyhow!("stream unavailable"));
            };
            let (tx, rx) = mpsc::channel(16);
            for fragment in fragments {
                let _ = tx.try_send(fragment.clone());
            }
            Ok(TokenStream::new(rx))
        }

        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "fixture".to_string(),
                model: "fixture".to_string(),
                context_window: 4096,
                supports_streaming: true,
                is_local: true,
            }
        }

        async fn is_ready(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn stream_fragments_are_concatenated() {
        let llm = FixtureLlm {
            blocking: "blocking".to_string(),
            stream_fragments: Some(vec!["Hel".to_string(), "lo".to_string()]),
        };
        let text = generate_with_stream_fallback(&llm, "prompt").await.unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn failed_stream_falls_back_to_blocking_call() {
        let llm = FixtureLlm {
            blocking: "blocking".to_string(),
            stream_fragments: None,
        };
        let text = generate_with_stream_fallback(&llm, "prompt").await.unwrap();
        assert_eq!(text, "blocking");
    }

    #[tokio::test]
    async fn empty_stream_falls_back_to_blocking_call() {
        let llm = FixtureLlm {
            blocking: "blocking".to_string(),
            stream_fragments: Some(Vec::new()),
        };
        let text = generate_with_stream_fallback(&llm, "prompt").await.unwrap();
        assert_eq!(text, "blocking");
    }
}

//! External API providers for the language-model gateway.
//!
//! Talks to OpenAI-compatible chat-completions endpoints, including a
//! local Ollama server.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use super::{ApiProvider, GenerationConfig, LlmProvider, ProviderInfo, TokenStream};

/// External API provider.
pub struct ExternalProvider {
    provider: ApiProvider,
    api_key: String,
    model: String,
    config: GenerationConfig,
    client: Client,
}

impl ExternalProvider {
    pub fn new(
        provider: ApiProvider,
        api_key: String,
        model: String,
        config: GenerationConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(300))
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            provider,
            api_key,
            model,
            config,
            client,
        })
    }

    fn endpoint(&self) -> String {
        match &self.provider {
            ApiProvider::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
            ApiProvider::Ollama => "http://localhost:11434/v1/chat/completions".to_string(),
            ApiProvider::Custom { endpoint } => endpoint.clone(),
        }
    }

    /// Parse a response body as JSON, returning a clear error if the
    /// server returned HTML (reverse proxies do this when the service
    /// behind them is down).
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') || trimmed.starts_with("<!") {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "Endpoint {} returned HTML instead of JSON (HTTP {}) — service may be down. Response: {}",
                endpoint,
                status,
                preview
            ));
        }
        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "Failed to parse JSON from {} (HTTP {}): {}. Body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })
    }
}

#[async_trait]
impl LlmProvider for ExternalProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let endpoint = self.endpoint();
        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "stream": false
        });

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Request to {} timed out — check network connectivity", endpoint)
                } else if e.is_connect() {
                    anyhow!("Failed to connect to {} — is the service running? {}", endpoint, e)
                } else {
                    anyhow!("Request to {} failed: {}", endpoint, e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await?;
            return Err(anyhow!("API error ({}): {}", status, error));
        }

        let result: ChatCompletionResponse = Self::parse_json_response(response, &endpoint).await?;
        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("{} returned an empty choices array", endpoint))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
        let (tx, rx) = mpsc::channel(100);

        let endpoint = self.endpoint();
        let api_key = self.api_key.clone();
        let model = self.model.clone();
        let prompt = prompt.to_string();
        let config = self.config.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            stream_chat_completions(client, endpoint, api_key, model, prompt, config, tx).await;
        });

        Ok(TokenStream::new(rx))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: match &self.provider {
                ApiProvider::Ollama => "Ollama".to_string(),
                ApiProvider::OpenAI => "OpenAI".to_string(),
                ApiProvider::Custom { endpoint } => format!("Custom ({})", endpoint),
            },
            model: self.model.clone(),
            context_window: match &self.provider {
                ApiProvider::OpenAI => 128000,
                ApiProvider::Ollama => 32768,
                ApiProvider::Custom { .. } => 4096,
            },
            supports_streaming: true,
            is_local: matches!(self.provider, ApiProvider::Ollama),
        }
    }

    async fn is_ready(&self) -> bool {
        true
    }
}

/// SSE streaming loop for OpenAI-compatible endpoints. Errors close the
/// channel; the caller's blocking fallback takes over.
async fn stream_chat_completions(
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    prompt: String,
    config: GenerationConfig,
    tx: mpsc::Sender<String>,
) {
    let request = json!({
        "model": model,
        "messages": [
            {"role": "user", "content": prompt}
        ],
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "top_p": config.top_p,
        "stream": true
    });

    let response = match client
        .post(&endpoint)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&request)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, endpoint = %endpoint, "stream request failed");
            return;
        }
    };

    if !response.status().is_success() {
        tracing::error!(status = %response.status(), endpoint = %endpoint, "stream API error");
        return;
    }

    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        match chunk_result {
            Ok(chunk) => {
                let chunk_str = String::from_utf8_lossy(&chunk);
                for line in chunk_str.lines() {
                    if let Some(data) = line.strip_prefix("data: ") {
                        if data == "[DONE]" {
                            return;
                        }
                        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data) {
                            if let Some(content) = parsed["choices"]
                                .get(0)
                                .and_then(|choice| choice["delta"]["content"].as_str())
                            {
                                if tx.send(content.to_string()).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "stream chunk error");
                break;
            }
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: String,
}

//! Chat-completion API client
//!
//! Direct HTTP client for the two supported endpoints: Azure OpenAI
//! (`api-key` header) and RAGFlow's OpenAI-compatible chat API
//! (`Authorization: Bearer`). Both take the same message list and return the
//! same `choices[0].message.content` shape.

use crate::config::{HttpConfig, ProviderConfig};
use crate::error::AppError;
use crate::orchestrator::completion_types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, GenerationParams,
};
use crate::orchestrator::error::CompletionError;
use anyhow::anyhow;
use async_trait::async_trait;
use std::time::Duration;

/// Anything that can turn a conversation into the next assistant message
///
/// The pipeline only depends on this trait, so runs can be driven against
/// an in-process fake in tests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `messages` and return the text of the first choice
    ///
    /// # Errors
    /// * `CompletionError::Transport` - no HTTP response
    /// * `CompletionError::Http` - non-2xx status, body kept verbatim
    /// * `CompletionError::MissingContent` - 2xx without usable content
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, CompletionError>;
}

/// Build the shared `reqwest::Client` (connection pooling)
pub fn build_http_client(http: &HttpConfig) -> Result<reqwest::Client, AppError> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = http.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| AppError::Internal(anyhow!("Failed to build HTTP client: {}", e)))
}

/// Completion client for a configured remote endpoint
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    provider: ProviderConfig,
}

impl HttpCompletionClient {
    /// Create a client for `provider` using a shared `reqwest::Client`
    pub fn new(client: reqwest::Client, provider: ProviderConfig) -> Self {
        Self { client, provider }
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> reqwest::RequestBuilder {
        let url = self.provider.completions_url();
        match &self.provider {
            ProviderConfig::Azure { api_key, .. } => {
                let body = ChatCompletionRequest {
                    model: None,
                    messages,
                    temperature: params.temperature,
                    max_tokens: params.max_tokens,
                    stream: None,
                };
                self.client
                    .post(url)
                    .header("api-key", api_key.as_str())
                    .json(&body)
            }
            ProviderConfig::RagFlow { api_key, model, .. } => {
                let body = ChatCompletionRequest {
                    model: Some(model.as_str()),
                    messages,
                    temperature: params.temperature,
                    max_tokens: params.max_tokens,
                    stream: Some(false),
                };
                self.client.post(url).bearer_auth(api_key).json(&body)
            }
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, CompletionError> {
        tracing::debug!(
            provider = self.provider.name(),
            message_count = messages.len(),
            max_tokens = params.max_tokens,
            "Calling completion endpoint"
        );

        let response = self
            .build_request(messages, params)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        // Check HTTP status
        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            tracing::error!(
                provider = self.provider.name(),
                status_code = status_code,
                error_body = %error_body,
                "Completion endpoint returned error status"
            );

            return Err(CompletionError::Http {
                status: status_code,
                body: error_body,
            });
        }

        let response_body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(format!("failed to read body: {}", e)))?;

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&response_body).map_err(|e| {
                CompletionError::MissingContent(format!(
                    "body is not a chat-completion object ({}): {}",
                    e, response_body
                ))
            })?;

        let text = parsed.first_content().ok_or_else(|| {
            CompletionError::MissingContent(format!("response body: {}", response_body))
        })?;

        tracing::debug!(
            provider = self.provider.name(),
            response_len = text.len(),
            "Received completion"
        );

        Ok(text.to_string())
    }
}

//! Language model generation
//!
//! The orchestrator holds the client as an injected `Arc<dyn LanguageModel>`
//! with session-scoped lifecycle; nothing here is process-global.

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Max tokens for a spoken reply; companions keep answers short
const MAX_TOKENS: u32 = 200;

/// Generates a reply for one utterance
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce a completion for the prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Response content block from the Messages API
#[derive(serde::Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Response from the Messages API
#[derive(serde::Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

/// Anthropic Messages API client
#[derive(Debug)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl AnthropicClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the API key is empty
    pub fn new(api_key: SecretString, model: &str) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "Anthropic API key required for generation".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl LanguageModel for AnthropicClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        #[derive(serde::Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(serde::Serialize)]
        struct MessagesRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<Message<'a>>,
        }

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "Anthropic API error {status}: {body}"
            )));
        }

        let result: MessagesResponse = response.json().await?;
        let reply = result
            .content
            .first()
            .and_then(|block| block.text.clone())
            .unwrap_or_default();

        tracing::debug!(chars = reply.len(), "generation complete");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_config_error() {
        let err =
            AnthropicClient::new(String::new().into(), "claude-3-5-sonnet-20240620")
                .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

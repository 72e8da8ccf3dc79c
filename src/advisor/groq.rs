//! Reqwest client for an OpenAI-compatible chat-completions endpoint (Groq by default).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{
    Client, Response,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};

use super::{
    Advisor, AdvisorError, ChatTurn, TokenStream,
    sse::{UpstreamError, decode_token_stream},
};
use crate::config::AdvisorConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    error: Option<UpstreamError>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}

#[derive(Clone)]
pub struct GroqAdvisor {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GroqAdvisor {
    pub fn new(api_url: &str, api_key: String, model: String) -> Result<Self, AdvisorError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", api_url.trim_end_matches('/')),
            api_key,
            model,
        })
    }

    /// Builds the advisor when an API key is present.
    pub fn from_config(config: &AdvisorConfig) -> Result<Option<Self>, AdvisorError> {
        match &config.api_key {
            Some(key) => Self::new(&config.api_url, key.clone(), config.model.clone()).map(Some),
            None => Ok(None),
        }
    }

    async fn send(&self, turns: &[ChatTurn], stream: bool) -> Result<Response, AdvisorError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: turns,
            stream,
            temperature: 0.7,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Advisor for GroqAdvisor {
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String, AdvisorError> {
        let response: CompletionResponse = self
            .send(&turns, false)
            .await?
            .json()
            .await
            .map_err(|e| AdvisorError::Decode(e.to_string()))?;

        if let Some(err) = response.error {
            return Err(AdvisorError::Upstream(err.message));
        }
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AdvisorError::Decode("empty completion".into()))
    }

    async fn stream(&self, turns: Vec<ChatTurn>) -> Result<TokenStream, AdvisorError> {
        let response = self.send(&turns, true).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(AdvisorError::Http))
            .boxed();
        Ok(decode_token_stream(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::TurnRole;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let advisor =
            GroqAdvisor::new("https://api.groq.com/openai/v1/", "k".into(), "m".into()).unwrap();
        assert_eq!(advisor.endpoint, "https://api.groq.com/openai/v1/chat/completions");
    }

    #[test]
    fn request_body_uses_openai_roles() {
        let turns = vec![
            ChatTurn::new(TurnRole::System, "sys"),
            ChatTurn::new(TurnRole::Assistant, "prev"),
        ];
        let body = CompletionRequest {
            model: "m",
            messages: &turns,
            stream: true,
            temperature: 0.7,
            max_tokens: MAX_TOKENS,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn from_config_without_key_is_none() {
        let config = AdvisorConfig {
            api_key: None,
            api_url: "http://localhost".into(),
            model: "m".into(),
        };
        assert!(GroqAdvisor::from_config(&config).unwrap().is_none());
    }
}

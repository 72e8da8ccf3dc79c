//! Upstream chat model the chatbot relays.
//!
//! [`Advisor`] is the seam between the chat service and the network: the
//! service builds the turns, the advisor returns a whole reply or a stream
//! of text deltas.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;

pub mod groq;
pub mod sse;

pub use groq::GroqAdvisor;

pub const SYSTEM_PROMPT: &str = "Tu es un conseiller agricole virtuel spécialisé au Burkina Faso. \
Réponds en français, de manière concise et pratique, aux questions agricoles. \
Inclus des conseils adaptés au climat et aux conditions du Burkina Faso.";

/// Reply stored when the advisor cannot answer.
pub const FALLBACK_REPLY: &str =
    "Désolé, je ne peux pas répondre pour le moment. Veuillez réessayer plus tard.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor is not configured")]
    NotConfigured,

    #[error("advisor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("advisor returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("advisor reported an error: {0}")]
    Upstream(String),

    #[error("invalid advisor payload: {0}")]
    Decode(String),
}

pub type TokenStream = BoxStream<'static, Result<String, AdvisorError>>;

#[async_trait]
pub trait Advisor: Send + Sync {
    /// Full reply in one response.
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String, AdvisorError>;

    /// Reply as a stream of text deltas, ending when the upstream signals completion.
    async fn stream(&self, turns: Vec<ChatTurn>) -> Result<TokenStream, AdvisorError>;
}

/// Stand-in used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAdvisor;

#[async_trait]
impl Advisor for DisabledAdvisor {
    async fn complete(&self, _turns: Vec<ChatTurn>) -> Result<String, AdvisorError> {
        Err(AdvisorError::NotConfigured)
    }

    async fn stream(&self, _turns: Vec<ChatTurn>) -> Result<TokenStream, AdvisorError> {
        Err(AdvisorError::NotConfigured)
    }
}

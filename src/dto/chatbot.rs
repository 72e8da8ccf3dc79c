use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Conversation;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    pub title: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ConversationList {
    #[schema(value_type = Vec<Conversation>)]
    pub items: Vec<Conversation>,
}

/// One `data:` frame of the streamed reply.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RelayFrame {
    Content { content: String },
    Done { done: bool, conversation_id: Uuid },
    Error { error: String },
}

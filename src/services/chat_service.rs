use std::collections::HashMap;

use chrono::Utc;
use futures_util::StreamExt;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    advisor::{Advisor, ChatTurn, FALLBACK_REPLY, SYSTEM_PROMPT, TurnRole},
    dto::chatbot::{ConversationList, CreateConversationRequest, RelayFrame, SendMessageRequest},
    entity::{
        conversations::{ActiveModel as ConversationActive, Column, Entity as Conversations, Model},
        messages::{self, ActiveModel as MessageActive, Column as MessageCol, Entity as Messages},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Conversation, MessageRole},
    response::{ApiResponse, Meta},
    services::{mapping::conversation_from_entity, validate::required_text},
    state::AppState,
};

/// Most recent messages sent upstream as context.
pub const HISTORY_LIMIT: usize = 20;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CONTENT_LEN: usize = 4000;
const RELAY_BUFFER: usize = 64;

/// System prompt followed by the tail of the stored history.
pub fn build_turns(history: &[messages::Model]) -> Vec<ChatTurn> {
    let start = history.len().saturating_sub(HISTORY_LIMIT);
    let mut turns = Vec::with_capacity(history.len() - start + 1);
    turns.push(ChatTurn::new(TurnRole::System, SYSTEM_PROMPT));
    for message in &history[start..] {
        let role = match MessageRole::parse(&message.role) {
            Some(MessageRole::Ai) => TurnRole::Assistant,
            _ => TurnRole::User,
        };
        turns.push(ChatTurn::new(role, message.content.clone()));
    }
    turns
}

/// A reply with no visible text is replaced by [`FALLBACK_REPLY`].
pub fn reply_or_fallback(reply: String) -> String {
    if reply.trim().is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        reply
    }
}

async fn find_own(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<Model> {
    Conversations::find_by_id(id)
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn load_messages<C: ConnectionTrait>(
    db: &C,
    conversation_id: Uuid,
) -> AppResult<Vec<messages::Model>> {
    Ok(Messages::find()
        .filter(MessageCol::ConversationId.eq(conversation_id))
        .order_by_asc(MessageCol::Id)
        .all(db)
        .await?)
}

async fn append_message<C: ConnectionTrait>(
    db: &C,
    conversation_id: Uuid,
    role: MessageRole,
    content: String,
) -> AppResult<messages::Model> {
    let message = MessageActive {
        id: NotSet,
        conversation_id: Set(conversation_id),
        role: Set(role.as_str().to_string()),
        content: Set(content),
        created_at: NotSet,
    }
    .insert(db)
    .await?;
    Ok(message)
}

async fn touch<C: ConnectionTrait>(db: &C, conversation: Model) -> AppResult<Model> {
    let mut active: ConversationActive = conversation.into();
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(db).await?)
}

async fn with_messages(state: &AppState, conversation: Model) -> AppResult<Conversation> {
    let history = load_messages(&state.orm, conversation.id).await?;
    conversation_from_entity(conversation, history)
}

pub async fn list_conversations(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ConversationList>> {
    let conversations = Conversations::find()
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::IsActive.eq(true))
        .order_by_desc(Column::UpdatedAt)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = conversations.iter().map(|c| c.id).collect();
    let mut grouped: HashMap<Uuid, Vec<messages::Model>> = HashMap::new();
    if !ids.is_empty() {
        let rows = Messages::find()
            .filter(MessageCol::ConversationId.is_in(ids))
            .order_by_asc(MessageCol::Id)
            .all(&state.orm)
            .await?;
        for row in rows {
            grouped.entry(row.conversation_id).or_default().push(row);
        }
    }

    let items = conversations
        .into_iter()
        .map(|c| {
            let history = grouped.remove(&c.id).unwrap_or_default();
            conversation_from_entity(c, history)
        })
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta {
        total: Some(items.len() as i64),
        ..Meta::empty()
    };
    Ok(ApiResponse::success("OK", ConversationList { items }, Some(meta)))
}

pub async fn get_conversation(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Conversation>> {
    let conversation = find_own(state, user, id).await?;
    let data = with_messages(state, conversation).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn create_conversation(
    state: &AppState,
    user: &AuthUser,
    payload: CreateConversationRequest,
) -> AppResult<ApiResponse<Conversation>> {
    let title = required_text("title", &payload.title, Some(MAX_TITLE_LEN))?;
    let conversation = ConversationActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        title: Set(title),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Conversation created",
        conversation_from_entity(conversation, Vec::new())?,
        Some(Meta::empty()),
    ))
}

pub async fn send_message(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: SendMessageRequest,
) -> AppResult<ApiResponse<Conversation>> {
    let conversation = find_own(state, user, id).await?;
    let content = required_text("content", &payload.content, Some(MAX_CONTENT_LEN))?;
    append_message(&state.orm, conversation.id, MessageRole::User, content).await?;

    let history = load_messages(&state.orm, conversation.id).await?;
    let reply = match state.advisor.complete(build_turns(&history)).await {
        Ok(reply) => reply_or_fallback(reply),
        Err(err) => {
            tracing::warn!(conversation_id = %conversation.id, error = %err, "advisor reply failed");
            FALLBACK_REPLY.to_string()
        }
    };
    append_message(&state.orm, conversation.id, MessageRole::Ai, reply).await?;

    let conversation = touch(&state.orm, conversation).await?;
    let data = with_messages(state, conversation).await?;
    Ok(ApiResponse::success("Message sent", data, Some(Meta::empty())))
}

/// Forwards each upstream token to `tx` and returns the whole reply.
///
/// Returns `None` after emitting an error frame when the upstream fails.
/// A closed receiver does not stop the relay, so the reply is still
/// collected when the client has gone away.
pub async fn relay_tokens(
    advisor: &dyn Advisor,
    turns: Vec<ChatTurn>,
    tx: &mpsc::Sender<RelayFrame>,
) -> Option<String> {
    let mut tokens = match advisor.stream(turns).await {
        Ok(tokens) => tokens,
        Err(err) => {
            tracing::warn!(error = %err, "advisor stream failed to start");
            let _ = tx.send(RelayFrame::Error { error: err.to_string() }).await;
            return None;
        }
    };

    let mut reply = String::new();
    while let Some(item) = tokens.next().await {
        match item {
            Ok(token) => {
                reply.push_str(&token);
                let _ = tx.send(RelayFrame::Content { content: token }).await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "advisor stream aborted");
                let _ = tx.send(RelayFrame::Error { error: err.to_string() }).await;
                return None;
            }
        }
    }
    Some(reply)
}

async fn run_relay(
    state: AppState,
    conversation: Model,
    turns: Vec<ChatTurn>,
    tx: mpsc::Sender<RelayFrame>,
) {
    let Some(reply) = relay_tokens(state.advisor.as_ref(), turns, &tx).await else {
        return;
    };
    if reply.trim().is_empty() {
        // Keep the streamed transcript equal to the stored one.
        let _ = tx
            .send(RelayFrame::Content {
                content: FALLBACK_REPLY.to_string(),
            })
            .await;
    }
    let reply = reply_or_fallback(reply);

    let conversation_id = conversation.id;
    let stored = async {
        append_message(&state.orm, conversation_id, MessageRole::Ai, reply).await?;
        touch(&state.orm, conversation).await
    }
    .await;

    let frame = match stored {
        Ok(_) => RelayFrame::Done {
            done: true,
            conversation_id,
        },
        Err(err) => {
            tracing::error!(%conversation_id, error = %err, "failed to store streamed reply");
            RelayFrame::Error {
                error: "Failed to save the reply".into(),
            }
        }
    };
    let _ = tx.send(frame).await;
}

/// Stores the user message and starts relaying the reply on its own task.
///
/// The returned receiver yields the frames of the event stream.
pub async fn stream_message(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: SendMessageRequest,
) -> AppResult<mpsc::Receiver<RelayFrame>> {
    let conversation = find_own(state, user, id).await?;
    let content = required_text("content", &payload.content, Some(MAX_CONTENT_LEN))?;
    append_message(&state.orm, conversation.id, MessageRole::User, content).await?;
    let history = load_messages(&state.orm, conversation.id).await?;
    let turns = build_turns(&history);

    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(run_relay(state.clone(), conversation, turns, tx));
    Ok(rx)
}

pub async fn delete_conversation(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let conversation = find_own(state, user, id).await?;
    let mut active: ConversationActive = conversation.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Conversation deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: i64, role: MessageRole, content: &str) -> messages::Model {
        messages::Model {
            id,
            conversation_id: Uuid::nil(),
            role: role.as_str().to_string(),
            content: content.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn turns_start_with_the_system_prompt() {
        let history = vec![
            message(1, MessageRole::User, "Quand semer le mil ?"),
            message(2, MessageRole::Ai, "En juin."),
            message(3, MessageRole::User, "Et le sorgho ?"),
        ];
        let turns = build_turns(&history);
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, TurnRole::System);
        assert_eq!(turns[2], ChatTurn::new(TurnRole::Assistant, "En juin."));
        assert_eq!(turns[3].content, "Et le sorgho ?");
    }

    #[test]
    fn history_is_capped_to_the_latest_messages() {
        let history: Vec<_> = (0..30)
            .map(|i| message(i, MessageRole::User, &format!("m{i}")))
            .collect();
        let turns = build_turns(&history);
        assert_eq!(turns.len(), HISTORY_LIMIT + 1);
        assert_eq!(turns[1].content, "m10");
        assert_eq!(turns.last().map(|t| t.content.as_str()), Some("m29"));
    }

    #[test]
    fn blank_replies_fall_back() {
        assert_eq!(reply_or_fallback(String::new()), FALLBACK_REPLY);
        assert_eq!(reply_or_fallback(" \n ".into()), FALLBACK_REPLY);
        assert_eq!(reply_or_fallback("Arrosez le soir.".into()), "Arrosez le soir.");
    }
}

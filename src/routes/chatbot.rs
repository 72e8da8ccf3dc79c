use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use futures_util::{Stream, StreamExt, stream};
use uuid::Uuid;

use crate::{
    dto::chatbot::{ConversationList, CreateConversationRequest, RelayFrame, SendMessageRequest},
    error::AppResult,
    extract::AppJson,
    middleware::auth::AuthUser,
    models::Conversation,
    response::ApiResponse,
    services::chat_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/conversations/{id}/messages", post(send_message))
        .route("/conversations/{id}/messages/stream", post(stream_message))
}

#[utoipa::path(
    get,
    path = "/api/chatbot/conversations",
    responses(
        (status = 200, description = "Active conversations, most recent first", body = ApiResponse<ConversationList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Chatbot"
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ConversationList>>> {
    let resp = chat_service::list_conversations(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/chatbot/conversations/{id}",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Conversation with its messages", body = ApiResponse<Conversation>),
        (status = 404, description = "Conversation not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Chatbot"
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Conversation>>> {
    let resp = chat_service::get_conversation(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/chatbot/conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = ApiResponse<Conversation>),
        (status = 400, description = "Blank title"),
    ),
    security(("bearer_auth" = [])),
    tag = "Chatbot"
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateConversationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Conversation>>)> {
    let resp = chat_service::create_conversation(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/chatbot/conversations/{id}/messages",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Conversation with the new exchange", body = ApiResponse<Conversation>),
        (status = 400, description = "Blank content"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Chatbot"
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<Conversation>>> {
    let resp = chat_service::send_message(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/chatbot/conversations/{id}/messages/stream",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Reply as server-sent events", body = RelayFrame, content_type = "text/event-stream"),
        (status = 400, description = "Blank content"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Chatbot"
)]
pub async fn stream_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<SendMessageRequest>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let rx = chat_service::stream_message(&state, &user, id, payload).await?;
    let frames = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    });
    let events = frames.map(|frame| Event::default().json_data(frame));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[utoipa::path(
    delete,
    path = "/api/chatbot/conversations/{id}",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Conversation deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Conversation not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Chatbot"
)]
pub async fn delete_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = chat_service::delete_conversation(&state, &user, id).await?;
    Ok(Json(resp))
}

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::favorites::{FavoriteProducerList, FavoriteStatus},
    error::AppResult,
    middleware::auth::AuthUser,
    models::UserSummary,
    response::ApiResponse,
    services::favorite_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_favorites))
        .route("/check/{producer_id}", get(check_favorite))
        .route(
            "/{producer_id}",
            axum::routing::post(add_favorite).delete(remove_favorite),
        )
}

#[utoipa::path(
    get,
    path = "/api/favorites",
    responses(
        (status = 200, description = "Favorite producers", body = ApiResponse<FavoriteProducerList>),
        (status = 403, description = "Caller is not a merchant"),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<FavoriteProducerList>>> {
    let resp = favorite_service::list_favorites(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/favorites/{producer_id}",
    params(
        ("producer_id" = Uuid, Path, description = "Producer ID")
    ),
    responses(
        (status = 201, description = "Added to favorites", body = ApiResponse<UserSummary>),
        (status = 400, description = "Already in favorites"),
        (status = 404, description = "Producer not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(producer_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserSummary>>)> {
    let resp = favorite_service::add_favorite(&state, &user, producer_id).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/favorites/{producer_id}",
    params(
        ("producer_id" = Uuid, Path, description = "Producer ID")
    ),
    responses(
        (status = 200, description = "Removed from favorites", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Favorite not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(producer_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = favorite_service::remove_favorite(&state, &user, producer_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/favorites/check/{producer_id}",
    params(
        ("producer_id" = Uuid, Path, description = "Producer ID")
    ),
    responses(
        (status = 200, description = "Whether the producer is a favorite", body = ApiResponse<FavoriteStatus>)
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn check_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(producer_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FavoriteStatus>>> {
    let resp = favorite_service::check_favorite(&state, &user, producer_id).await?;
    Ok(Json(resp))
}

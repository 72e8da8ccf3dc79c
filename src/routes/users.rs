use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, put},
};

use crate::{
    dto::users::{ProfileImageRequest, UpdateProfileRequest, UserList},
    error::AppResult,
    extract::AppJson,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    routes::params::UserListQuery,
    services::user_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/producers", get(list_producers))
        .route("/merchants", get(list_merchants))
        .route("/profile", put(update_profile))
        .route("/profile-image", put(update_profile_image))
}

#[utoipa::path(
    get,
    path = "/api/users/producers",
    params(UserListQuery),
    responses(
        (status = 200, description = "Active producers", body = ApiResponse<UserList>),
        (status = 403, description = "Caller is not a merchant"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_producers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = user_service::list_producers(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/users/merchants",
    params(UserListQuery),
    responses(
        (status = 200, description = "Active merchants", body = ApiResponse<UserList>),
        (status = 403, description = "Caller is not a producer"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_merchants(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = user_service::list_merchants(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<User>),
        (status = 400, description = "Blank field"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::update_profile(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/users/profile-image",
    request_body = ProfileImageRequest,
    responses(
        (status = 200, description = "Profile image replaced", body = ApiResponse<User>),
        (status = 400, description = "Empty image reference"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_profile_image(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<ProfileImageRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::update_profile_image(&state, &user, payload).await?;
    Ok(Json(resp))
}

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::{
    dto::users::{ProfileImageRequest, UpdateProfileRequest, UserList},
    entity::users::{ActiveModel, Column, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_merchant, ensure_producer},
    models::{Role, User},
    response::{ApiResponse, Meta},
    routes::params::UserListQuery,
    services::{
        mapping::user_from_entity,
        validate::{
            MAX_COMPANY_LEN, MAX_LOCATION_LEN, MAX_NAME_LEN, MAX_PHONE_LEN, like_pattern,
            required_text,
        },
    },
    state::AppState,
};

async fn list_by_role(
    state: &AppState,
    role: Role,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all()
        .add(Column::Role.eq(role.as_str()))
        .add(Column::IsActive.eq(true));
    if let Some(location) = query.location.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(Column::Location).ilike(like_pattern(location)));
    }
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(q);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::FirstName).ilike(pattern.clone()))
                .add(Expr::col(Column::LastName).ilike(pattern)),
        );
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", UserList { items }, Some(meta)))
}

pub async fn list_producers(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_merchant(user)?;
    list_by_role(state, Role::Producer, query).await
}

pub async fn list_merchants(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_producer(user)?;
    list_by_role(state, Role::Merchant, query).await
}

async fn load_self(state: &AppState, user: &AuthUser) -> AppResult<ActiveModel> {
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(model.into())
}

/// Validated profile fields; `None` leaves the stored value as is.
#[derive(Debug, Default, PartialEq)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub company_name: Option<String>,
}

fn provided(field: &str, value: &Option<String>, max: usize) -> AppResult<Option<String>> {
    value
        .as_deref()
        .map(|v| required_text(field, v, Some(max)))
        .transpose()
}

/// Applies the registration limits to a partial update. A provided field
/// must not be blank.
pub fn profile_changes(payload: &UpdateProfileRequest, role: Role) -> AppResult<ProfileChanges> {
    Ok(ProfileChanges {
        first_name: provided("first_name", &payload.first_name, MAX_NAME_LEN)?,
        last_name: provided("last_name", &payload.last_name, MAX_NAME_LEN)?,
        phone: provided("phone", &payload.phone, MAX_PHONE_LEN)?,
        location: provided("location", &payload.location, MAX_LOCATION_LEN)?,
        // Producers carry no company.
        company_name: match role {
            Role::Merchant => provided("company_name", &payload.company_name, MAX_COMPANY_LEN)?,
            Role::Producer => None,
        },
    })
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let changes = profile_changes(&payload, user.role)?;
    let mut active = load_self(state, user).await?;

    if let Some(first_name) = changes.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = changes.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(phone) = changes.phone {
        active.phone = Set(phone);
    }
    if let Some(location) = changes.location {
        active.location = Set(location);
    }
    if let Some(company) = changes.company_name {
        active.company_name = Set(Some(company));
    }
    active.updated_at = Set(Utc::now().into());

    let updated = active.update(&state.orm).await?;
    Ok(ApiResponse::success(
        "Profile updated",
        user_from_entity(updated)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_profile_image(
    state: &AppState,
    user: &AuthUser,
    payload: ProfileImageRequest,
) -> AppResult<ApiResponse<User>> {
    let image = required_text("profile_image", &payload.profile_image, None)?;
    let mut active = load_self(state, user).await?;
    active.profile_image = Set(Some(image));
    active.updated_at = Set(Utc::now().into());

    let updated = active.update(&state.orm).await?;
    tracing::debug!(user_id = %user.user_id, "profile image replaced");
    Ok(ApiResponse::success(
        "Profile image updated",
        user_from_entity(updated)?,
        Some(Meta::empty()),
    ))
}

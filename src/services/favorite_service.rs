use std::collections::HashMap;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    dto::favorites::{FavoriteProducerList, FavoriteStatus},
    entity::{
        favorites::{ActiveModel, Column, Entity as Favorites},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult, is_unique_violation},
    middleware::auth::{AuthUser, ensure_merchant},
    models::{Role, UserSummary},
    response::{ApiResponse, Meta},
    services::mapping::user_summary,
    state::AppState,
};

fn pair(merchant_id: Uuid, producer_id: Uuid) -> Condition {
    Condition::all()
        .add(Column::MerchantId.eq(merchant_id))
        .add(Column::ProducerId.eq(producer_id))
}

pub async fn list_favorites(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<FavoriteProducerList>> {
    ensure_merchant(user)?;
    let favorites = Favorites::find()
        .filter(Column::MerchantId.eq(user.user_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?;

    let producer_ids: Vec<Uuid> = favorites.iter().map(|f| f.producer_id).collect();
    let mut producers: HashMap<Uuid, UserSummary> = if producer_ids.is_empty() {
        HashMap::new()
    } else {
        Users::find()
            .filter(UserCol::Id.is_in(producer_ids))
            .filter(UserCol::IsActive.eq(true))
            .all(&state.orm)
            .await?
            .iter()
            .map(|u| (u.id, user_summary(u)))
            .collect()
    };

    // Keep favorite order; deactivated producers drop out.
    let items = favorites
        .iter()
        .filter_map(|f| producers.remove(&f.producer_id))
        .collect::<Vec<_>>();
    let meta = Meta {
        total: Some(items.len() as i64),
        ..Meta::empty()
    };

    Ok(ApiResponse::success("OK", FavoriteProducerList { items }, Some(meta)))
}

pub async fn add_favorite(
    state: &AppState,
    user: &AuthUser,
    producer_id: Uuid,
) -> AppResult<ApiResponse<UserSummary>> {
    ensure_merchant(user)?;
    let producer = Users::find_by_id(producer_id)
        .filter(UserCol::Role.eq(Role::Producer.as_str()))
        .filter(UserCol::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let existing = Favorites::find()
        .filter(pair(user.user_id, producer_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest("Already in favorites".into()));
    }

    let favorite = ActiveModel {
        id: Set(Uuid::new_v4()),
        merchant_id: Set(user.user_id),
        producer_id: Set(producer_id),
        created_at: NotSet,
    };
    // A concurrent add can still slip past the check above.
    let favorite = match favorite.insert(&state.orm).await {
        Ok(f) => f,
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::BadRequest("Already in favorites".into()));
        }
        Err(err) => return Err(err.into()),
    };
    tracing::debug!(merchant_id = %favorite.merchant_id, producer_id = %favorite.producer_id, "favorite added");

    Ok(ApiResponse::success(
        "Added to favorites",
        user_summary(&producer),
        Some(Meta::empty()),
    ))
}

pub async fn remove_favorite(
    state: &AppState,
    user: &AuthUser,
    producer_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_merchant(user)?;
    let favorite = Favorites::find()
        .filter(pair(user.user_id, producer_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    favorite.delete(&state.orm).await?;

    Ok(ApiResponse::success(
        "Removed from favorites",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn check_favorite(
    state: &AppState,
    user: &AuthUser,
    producer_id: Uuid,
) -> AppResult<ApiResponse<FavoriteStatus>> {
    ensure_merchant(user)?;
    let existing = Favorites::find()
        .filter(pair(user.user_id, producer_id))
        .one(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "OK",
        FavoriteStatus {
            is_favorite: existing.is_some(),
        },
        Some(Meta::empty()),
    ))
}

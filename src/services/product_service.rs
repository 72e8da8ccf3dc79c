use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_producer},
    models::{Product, ProductWithProducer},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    services::{
        mapping::{product_from_entity, user_summary},
        validate::{like_pattern, optional_text, required_text},
    },
    state::AppState,
};

pub const MAX_DESCRIPTION_LEN: usize = 500;

fn check_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    Ok(())
}

fn check_quantity(quantity: i32, min: i32) -> AppResult<()> {
    if quantity < min {
        return Err(AppError::BadRequest(format!("quantity must be at least {min}")));
    }
    Ok(())
}

/// Checks a creation payload; returns the trimmed title and description.
pub fn validate_new_product(payload: &CreateProductRequest) -> AppResult<(String, Option<String>)> {
    let title = required_text("title", &payload.title, Some(200))?;
    check_price(payload.price)?;
    check_quantity(payload.quantity, 1)?;
    let description = optional_text(
        "description",
        payload.description.as_deref(),
        Some(MAX_DESCRIPTION_LEN),
    )?;
    Ok((title, description))
}

/// Attaches producer summaries with one lookup for the whole page.
async fn with_producers(
    state: &AppState,
    models: Vec<ProductModel>,
) -> AppResult<Vec<ProductWithProducer>> {
    let producer_ids: Vec<Uuid> = models.iter().map(|p| p.producer_id).collect();
    let producers: HashMap<Uuid, _> = if producer_ids.is_empty() {
        HashMap::new()
    } else {
        Users::find()
            .filter(UserCol::Id.is_in(producer_ids))
            .all(&state.orm)
            .await?
            .into_iter()
            .map(|u| (u.id, user_summary(&u)))
            .collect()
    };

    models
        .into_iter()
        .map(|model| {
            let producer = producers.get(&model.producer_id).cloned();
            Ok(ProductWithProducer {
                product: product_from_entity(model)?,
                producer,
            })
        })
        .collect()
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(Column::IsActive.eq(true));

    if let Some(category) = query.category {
        condition = condition.add(Column::Category.eq(category.as_str()));
    }

    if let Some(producer_id) = query.producer_id {
        condition = condition.add(Column::ProducerId.eq(producer_id));
    }

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Title).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(location) = query.location.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let producers_there = Query::select()
            .column(UserCol::Id)
            .from(Users)
            .and_where(Expr::col(UserCol::Location).ilike(like_pattern(location)))
            .to_owned();
        condition = condition.add(Column::ProducerId.in_subquery(producers_there));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Title => Column::Title,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_producers(state, models).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn list_my_products(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_producer(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Products::find()
        .filter(Column::ProducerId.eq(user.user_id))
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|model| {
            Ok(ProductWithProducer {
                product: product_from_entity(model)?,
                producer: None,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("My products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductWithProducer>> {
    let model = Products::find_by_id(id)
        .filter(Column::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    let model = match model {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    let mut items = with_producers(state, vec![model]).await?;
    let product = items.pop().ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product, Some(Meta::empty())))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_producer(user)?;
    let (title, description) = validate_new_product(&payload)?;
    let image = optional_text("image", payload.image.as_deref(), None)?.unwrap_or_default();

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        producer_id: Set(user.user_id),
        title: Set(title),
        price: Set(payload.price),
        quantity: Set(payload.quantity),
        category: Set(payload.category.as_str().to_string()),
        description: Set(description),
        image: Set(image),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;
    tracing::info!(product_id = %product.id, producer_id = %user.user_id, "product created");

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product)?,
        Some(Meta::empty()),
    ))
}

/// Finds a product owned by `user`. Foreign products read as missing.
async fn find_owned(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .filter(Column::ProducerId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

/// Outer `None` keeps the stored description; a blank value clears it.
fn description_change(value: Option<&str>) -> AppResult<Option<Option<String>>> {
    value
        .map(|v| optional_text("description", Some(v), Some(MAX_DESCRIPTION_LEN)))
        .transpose()
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_producer(user)?;
    let existing = find_owned(state, user, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title.as_deref() {
        active.title = Set(required_text("title", title, Some(200))?);
    }
    if let Some(price) = payload.price {
        check_price(price)?;
        active.price = Set(price);
    }
    if let Some(quantity) = payload.quantity {
        check_quantity(quantity, 0)?;
        active.quantity = Set(quantity);
    }
    if let Some(category) = payload.category {
        active.category = Set(category.as_str().to_string());
    }
    if let Some(description) = description_change(payload.description.as_deref())? {
        active.description = Set(description);
    }
    if let Some(image) = optional_text("image", payload.image.as_deref(), None)? {
        active.image = Set(image);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_producer(user)?;
    let existing = find_owned(state, user, id).await?;

    let mut active: ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;
    tracing::info!(product_id = %id, "product deactivated");

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

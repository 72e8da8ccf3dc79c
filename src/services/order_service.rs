use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, OrderList, UpdateOrderStatusRequest},
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_merchant, ensure_producer},
    models::{OrderDetails, OrderStatus, Role},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        mapping::{order_from_entity, product_summary, user_summary},
        validate::optional_text,
    },
    state::AppState,
};

pub const MAX_MESSAGE_LEN: usize = 500;

/// Checks that a producer may move an order from `current` to `next`.
pub fn check_transition(current: OrderStatus, next: OrderStatus) -> AppResult<()> {
    if next == OrderStatus::Pending {
        return Err(AppError::BadRequest("Invalid status".into()));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }
    Ok(())
}

pub fn compute_total(price: i64, quantity: i32) -> AppResult<i64> {
    price
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| AppError::BadRequest("order total is too large".into()))
}

/// Loads the parties and products of `orders` in two batched queries.
async fn with_details(state: &AppState, orders: Vec<OrderModel>) -> AppResult<Vec<OrderDetails>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let user_ids: Vec<Uuid> = orders
        .iter()
        .flat_map(|o| [o.merchant_id, o.producer_id])
        .collect();
    let product_ids: Vec<Uuid> = orders.iter().map(|o| o.product_id).collect();

    let users: HashMap<Uuid, _> = Users::find()
        .filter(UserCol::Id.is_in(user_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|u| (u.id, user_summary(&u)))
        .collect();
    let products = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(&state.orm)
        .await?
        .iter()
        .map(|p| Ok((p.id, product_summary(p)?)))
        .collect::<AppResult<HashMap<Uuid, _>>>()?;

    orders
        .into_iter()
        .map(|model| {
            let merchant = users.get(&model.merchant_id).cloned();
            let producer = users.get(&model.producer_id).cloned();
            let product = products.get(&model.product_id).cloned();
            Ok(OrderDetails {
                order: order_from_entity(model)?,
                merchant,
                producer,
                product,
            })
        })
        .collect()
}

async fn single_details(state: &AppState, order: OrderModel) -> AppResult<OrderDetails> {
    with_details(state, vec![order])
        .await?
        .pop()
        .ok_or(AppError::NotFound)
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let owner_col = match user.role {
        Role::Merchant => OrderCol::MerchantId,
        Role::Producer => OrderCol::ProducerId,
    };
    let mut condition = Condition::all().add(owner_col.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_details(state, orders).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetails>> {
    let order = Orders::find_by_id(id)
        .filter(
            Condition::any()
                .add(OrderCol::MerchantId.eq(user.user_id))
                .add(OrderCol::ProducerId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let data = single_details(state, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderDetails>> {
    ensure_merchant(user)?;
    if payload.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }
    let message = optional_text("message", payload.message.as_deref(), Some(MAX_MESSAGE_LEN))?;

    let product = Products::find_by_id(payload.product_id)
        .filter(
            Condition::all()
                .add(ProdCol::ProducerId.eq(payload.producer_id))
                .add(ProdCol::IsActive.eq(true)),
        )
        .one(&state.orm)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if product.quantity < payload.quantity {
        return Err(AppError::BadRequest("Insufficient stock".into()));
    }
    let total_price = compute_total(product.price, payload.quantity)?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        merchant_id: Set(user.user_id),
        producer_id: Set(payload.producer_id),
        product_id: Set(product.id),
        quantity: Set(payload.quantity),
        total_price: Set(total_price),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        message: Set(message),
        delivery_date: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(
        order_id = %order.id,
        merchant_id = %order.merchant_id,
        producer_id = %order.producer_id,
        total_price = order.total_price,
        "order created"
    );

    let data = single_details(state, order).await?;
    Ok(ApiResponse::success("Order created", data, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderDetails>> {
    ensure_producer(user)?;
    let next = payload.status;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .filter(OrderCol::ProducerId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown order status {}", order.status)))?;
    check_transition(current, next)?;

    if next == OrderStatus::Accepted {
        // Stock moves only on acceptance; the row lock serialises concurrent accepts.
        let product = Products::find_by_id(order.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::BadRequest("Product no longer exists".into()))?;
        if product.quantity < order.quantity {
            return Err(AppError::BadRequest("Insufficient stock".into()));
        }
        let remaining = product.quantity - order.quantity;
        let mut product: ProductActive = product.into();
        product.quantity = Set(remaining);
        product.updated_at = Set(Utc::now().into());
        product.update(&txn).await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    if next == OrderStatus::Delivered {
        active.delivery_date = Set(Some(Utc::now().into()));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        from = current.as_str(),
        to = next.as_str(),
        "order status changed"
    );

    let data = single_details(state, order).await?;
    Ok(ApiResponse::success("Order updated", data, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_cannot_reset_to_pending() {
        assert!(matches!(
            check_transition(OrderStatus::Pending, OrderStatus::Pending),
            Err(AppError::BadRequest(msg)) if msg == "Invalid status"
        ));
    }

    #[test]
    fn refused_and_delivered_are_terminal() {
        for next in [OrderStatus::Accepted, OrderStatus::Refused, OrderStatus::Delivered] {
            assert!(check_transition(OrderStatus::Refused, next).is_err());
            assert!(check_transition(OrderStatus::Delivered, next).is_err());
        }
    }

    #[test]
    fn pending_order_cannot_skip_to_delivered() {
        assert!(check_transition(OrderStatus::Pending, OrderStatus::Delivered).is_err());
        assert!(check_transition(OrderStatus::Pending, OrderStatus::Accepted).is_ok());
        assert!(check_transition(OrderStatus::Accepted, OrderStatus::Delivered).is_ok());
    }

    #[test]
    fn total_is_price_times_quantity() {
        assert_eq!(compute_total(800, 3).unwrap(), 2400);
        assert!(compute_total(i64::MAX, 2).is_err());
    }
}

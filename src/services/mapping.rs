//! Entity rows to API models. A stored enum string that no longer parses is
//! a data error, reported as 500.

use chrono::Utc;

use crate::{
    entity::{conversations, messages, orders, products, users},
    error::{AppError, AppResult},
    models::{
        Category, Conversation, Message, MessageRole, Order, OrderStatus, Product,
        ProductSummary, Role, User, UserSummary,
    },
};

fn corrupt(field: &str, value: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!("stored {field} {value:?} is not recognised"))
}

pub fn user_from_entity(model: users::Model) -> AppResult<User> {
    let role = Role::parse(&model.role).ok_or_else(|| corrupt("role", &model.role))?;
    Ok(User {
        id: model.id,
        first_name: model.first_name,
        last_name: model.last_name,
        email: model.email,
        phone: model.phone,
        location: model.location,
        role,
        company_name: model.company_name,
        profile_image: model.profile_image,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub fn user_summary(model: &users::Model) -> UserSummary {
    UserSummary {
        id: model.id,
        first_name: model.first_name.clone(),
        last_name: model.last_name.clone(),
        phone: model.phone.clone(),
        location: model.location.clone(),
        company_name: model.company_name.clone(),
        profile_image: model.profile_image.clone(),
    }
}

pub fn product_from_entity(model: products::Model) -> AppResult<Product> {
    let category =
        Category::parse(&model.category).ok_or_else(|| corrupt("category", &model.category))?;
    Ok(Product {
        id: model.id,
        producer_id: model.producer_id,
        title: model.title,
        price: model.price,
        quantity: model.quantity,
        category,
        description: model.description,
        image: model.image,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub fn product_summary(model: &products::Model) -> AppResult<ProductSummary> {
    let category =
        Category::parse(&model.category).ok_or_else(|| corrupt("category", &model.category))?;
    Ok(ProductSummary {
        id: model.id,
        title: model.title.clone(),
        price: model.price,
        category,
        image: model.image.clone(),
    })
}

pub fn order_from_entity(model: orders::Model) -> AppResult<Order> {
    let status = OrderStatus::parse(&model.status).ok_or_else(|| corrupt("status", &model.status))?;
    Ok(Order {
        id: model.id,
        merchant_id: model.merchant_id,
        producer_id: model.producer_id,
        product_id: model.product_id,
        quantity: model.quantity,
        total_price: model.total_price,
        status,
        message: model.message,
        delivery_date: model.delivery_date.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub fn message_from_entity(model: messages::Model) -> AppResult<Message> {
    let role = MessageRole::parse(&model.role).ok_or_else(|| corrupt("message role", &model.role))?;
    Ok(Message {
        id: model.id,
        role,
        content: model.content,
        timestamp: model.created_at.with_timezone(&Utc),
    })
}

pub fn conversation_from_entity(
    model: conversations::Model,
    messages: Vec<messages::Model>,
) -> AppResult<Conversation> {
    let messages = messages
        .into_iter()
        .map(message_from_entity)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Conversation {
        id: model.id,
        user_id: model.user_id,
        title: model.title,
        is_active: model.is_active,
        messages,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub mod auth_service;
pub mod chat_service;
pub mod favorite_service;
pub mod mapping;
pub mod order_service;
pub mod product_service;
pub mod user_service;
pub mod validate;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Category, ProductWithProducer};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub title: String,
    pub price: i64,
    pub quantity: i32,
    pub category: Category,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub price: Option<i64>,
    pub quantity: Option<i32>,
    pub category: Option<Category>,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<ProductWithProducer>)]
    pub items: Vec<ProductWithProducer>,
}

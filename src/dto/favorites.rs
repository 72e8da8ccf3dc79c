use serde::Serialize;
use utoipa::ToSchema;

use crate::models::UserSummary;

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct FavoriteProducerList {
    #[schema(value_type = Vec<UserSummary>)]
    pub items: Vec<UserSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteStatus {
    pub is_favorite: bool,
}

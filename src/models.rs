use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Producer,
    Merchant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Producer => "PRODUCER",
            Role::Merchant => "MERCHANT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRODUCER" => Some(Role::Producer),
            "MERCHANT" => Some(Role::Merchant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Category {
    #[serde(rename = "Céréales")]
    Cereals,
    #[serde(rename = "Légumes")]
    Vegetables,
    #[serde(rename = "Fruits")]
    Fruits,
    #[serde(rename = "Tubercules")]
    Tubers,
    #[serde(rename = "Légumineuses")]
    Legumes,
    #[serde(rename = "Épices")]
    Spices,
    #[serde(rename = "Autres")]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Cereals,
        Category::Vegetables,
        Category::Fruits,
        Category::Tubers,
        Category::Legumes,
        Category::Spices,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cereals => "Céréales",
            Category::Vegetables => "Légumes",
            Category::Fruits => "Fruits",
            Category::Tubers => "Tubercules",
            Category::Legumes => "Légumineuses",
            Category::Spices => "Épices",
            Category::Other => "Autres",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// Order lifecycle: `PENDING -> ACCEPTED | REFUSED`, `ACCEPTED -> DELIVERED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Refused,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Refused => "REFUSED",
            OrderStatus::Delivered => "DELIVERED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(OrderStatus::Pending),
            "ACCEPTED" => Some(OrderStatus::Accepted),
            "REFUSED" => Some(OrderStatus::Refused),
            "DELIVERED" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Accepted)
                | (OrderStatus::Pending, OrderStatus::Refused)
                | (OrderStatus::Accepted, OrderStatus::Delivered)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Ai => "ai",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "ai" => Some(MessageRole::Ai),
            _ => None,
        }
    }
}

/// Account as exposed by the API. The password hash never leaves the service layer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub role: Role,
    pub company_name: Option<String>,
    pub profile_image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The contact subset embedded in products, orders and favorites.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub location: String,
    pub company_name: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub producer_id: Uuid,
    pub title: String,
    pub price: i64,
    pub quantity: i32,
    pub category: Category,
    pub description: Option<String>,
    pub image: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductWithProducer {
    #[serde(flatten)]
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub title: String,
    pub price: i64,
    pub category: Category,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub producer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub total_price: i64,
    pub status: OrderStatus,
    pub message: Option<String>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order with the parties and product it links, as listed to either side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub merchant: Option<UserSummary>,
    pub producer: Option<UserSummary>,
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: i64,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub is_active: bool,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_allows_only_forward_transitions() {
        use OrderStatus::*;
        let allowed = [(Pending, Accepted), (Pending, Refused), (Accepted, Delivered)];
        for from in [Pending, Accepted, Refused, Delivered] {
            for to in [Pending, Accepted, Refused, Delivered] {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from.as_str(),
                    to.as_str()
                );
            }
        }
    }

    #[test]
    fn category_uses_french_labels_on_the_wire() {
        let json = serde_json::to_string(&Category::Cereals).unwrap();
        assert_eq!(json, "\"Céréales\"");
        let parsed: Category = serde_json::from_str("\"Épices\"").unwrap();
        assert_eq!(parsed, Category::Spices);
        assert!(serde_json::from_str::<Category>("\"Meat\"").is_err());
    }

    #[test]
    fn category_parse_matches_serde_labels() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json.trim_matches('"'), category.as_str());
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("cereales"), None);
    }

    #[test]
    fn role_round_trips_through_storage_strings() {
        assert_eq!(Role::parse(Role::Producer.as_str()), Some(Role::Producer));
        assert_eq!(Role::parse(Role::Merchant.as_str()), Some(Role::Merchant));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(serde_json::to_string(&Role::Merchant).unwrap(), "\"MERCHANT\"");
    }

    #[test]
    fn message_role_is_lowercase() {
        assert_eq!(serde_json::to_string(&MessageRole::Ai).unwrap(), "\"ai\"");
        assert_eq!(MessageRole::parse("user"), Some(MessageRole::User));
        assert_eq!(MessageRole::parse("assistant"), None);
    }
}

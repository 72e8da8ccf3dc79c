use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, RegisterRequest},
        chatbot::{ConversationList, CreateConversationRequest, RelayFrame, SendMessageRequest},
        favorites::{FavoriteProducerList, FavoriteStatus},
        orders::{CreateOrderRequest, OrderList, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::{ProfileImageRequest, UpdateProfileRequest, UserList},
    },
    models::{
        Category, Conversation, Message, MessageRole, Order, OrderDetails, OrderStatus, Product,
        ProductSummary, ProductWithProducer, Role, User, UserSummary,
    },
    response::{ApiResponse, Meta},
    routes::{auth, chatbot, favorites, health, orders, params, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        products::list_products,
        products::list_my_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::list_my_orders,
        orders::get_order,
        orders::create_order,
        orders::update_order_status,
        users::list_producers,
        users::list_merchants,
        users::update_profile,
        users::update_profile_image,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        favorites::check_favorite,
        chatbot::list_conversations,
        chatbot::get_conversation,
        chatbot::create_conversation,
        chatbot::send_message,
        chatbot::stream_message,
        chatbot::delete_conversation
    ),
    components(
        schemas(
            Role,
            Category,
            OrderStatus,
            MessageRole,
            User,
            UserSummary,
            Product,
            ProductSummary,
            ProductWithProducer,
            Order,
            OrderDetails,
            Message,
            Conversation,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderList,
            UpdateProfileRequest,
            ProfileImageRequest,
            UserList,
            FavoriteProducerList,
            FavoriteStatus,
            CreateConversationRequest,
            SendMessageRequest,
            ConversationList,
            RelayFrame,
            params::Pagination,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<User>,
            ApiResponse<AuthResponse>,
            ApiResponse<ProductList>,
            ApiResponse<OrderList>,
            ApiResponse<OrderDetails>,
            ApiResponse<Conversation>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Products", description = "Product catalogue"),
        (name = "Orders", description = "Orders between merchants and producers"),
        (name = "Users", description = "Directories and profile"),
        (name = "Favorites", description = "Merchant favorite producers"),
        (name = "Chatbot", description = "Agricultural advisor conversations"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

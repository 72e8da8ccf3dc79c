use std::sync::Arc;
use std::time::Duration;

use agriconnect_api::{
    advisor::{Advisor, AdvisorError, ChatTurn, DisabledAdvisor, FALLBACK_REPLY, TokenStream},
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    dto::{
        auth::{LoginRequest, RegisterRequest},
        chatbot::{CreateConversationRequest, RelayFrame, SendMessageRequest},
        orders::{CreateOrderRequest, UpdateOrderStatusRequest},
        products::{CreateProductRequest, UpdateProductRequest},
    },
    entity::Products,
    error::AppError,
    middleware::auth::AuthUser,
    models::{Category, MessageRole, OrderStatus, Role},
    routes::params::{OrderListQuery, ProductQuery},
    services::{auth_service, chat_service, favorite_service, order_service, product_service},
    state::AppState,
};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use sea_orm::{ConnectionTrait, EntityTrait, Statement};
use tokio::sync::mpsc;

/// Streams a fixed list of tokens.
struct ScriptedAdvisor(Vec<&'static str>);

#[async_trait]
impl Advisor for ScriptedAdvisor {
    async fn complete(&self, _turns: Vec<ChatTurn>) -> Result<String, AdvisorError> {
        Ok(self.0.concat())
    }

    async fn stream(&self, _turns: Vec<ChatTurn>) -> Result<TokenStream, AdvisorError> {
        let tokens: Vec<Result<String, AdvisorError>> =
            self.0.iter().map(|t| Ok(t.to_string())).collect();
        Ok(stream::iter(tokens).boxed())
    }
}

// Integration flow: producer lists a product, merchant orders it, producer accepts and delivers.
// Everything shares one test because each run truncates the tables.
#[tokio::test]
async fn order_lifecycle_and_favorites_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let producer = register(&state, Role::Producer, "producteur@test.bf").await?;
    let merchant = register(&state, Role::Merchant, "commercant@test.bf").await?;

    // Duplicate email, differently cased, is rejected
    let duplicate = auth_service::register_user(
        &state,
        register_request(Role::Producer, "PRODUCTEUR@test.bf"),
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::BadRequest(_))));

    let login = auth_service::login_user(
        &state,
        LoginRequest {
            email: "commercant@test.bf".into(),
            password: "wrong-password".into(),
        },
    )
    .await;
    assert!(matches!(login, Err(AppError::Unauthorized(_))));

    // Producer lists rice
    let product = product_service::create_product(
        &state,
        &producer,
        CreateProductRequest {
            title: "Riz local".into(),
            price: 800,
            quantity: 10,
            category: Category::Cereals,
            description: Some("Riz de la vallée".into()),
            image: None,
        },
    )
    .await?
    .data
    .unwrap();

    let listed = product_service::list_products(
        &state,
        ProductQuery {
            category: Some(Category::Cereals),
            q: Some("RIZ".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(
        listed.items[0].producer.as_ref().map(|p| p.id),
        Some(producer.user_id)
    );

    // Merchant cannot order more than the stock
    let too_many = order_service::create_order(
        &state,
        &merchant,
        CreateOrderRequest {
            producer_id: producer.user_id,
            product_id: product.id,
            quantity: 11,
            message: None,
        },
    )
    .await;
    assert!(matches!(too_many, Err(AppError::BadRequest(_))));

    let order = order_service::create_order(
        &state,
        &merchant,
        CreateOrderRequest {
            producer_id: producer.user_id,
            product_id: product.id,
            quantity: 3,
            message: Some("Livraison au marché de Rood Woko".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(order.order.total_price, 2400);
    assert_eq!(order.order.status, OrderStatus::Pending);

    // A merchant may not change the status
    let forbidden = status(&state, &merchant, order.order.id, OrderStatus::Accepted).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let accepted = status(&state, &producer, order.order.id, OrderStatus::Accepted).await?;
    assert_eq!(accepted, OrderStatus::Accepted);

    let stock = Products::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .map(|p| p.quantity);
    assert_eq!(stock, Some(7));

    let delivered = order_service::update_order_status(
        &state,
        &producer,
        order.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(delivered.order.status, OrderStatus::Delivered);
    assert!(delivered.order.delivery_date.is_some());

    // Delivered is terminal
    let again = status(&state, &producer, order.order.id, OrderStatus::Refused).await;
    assert!(matches!(again, Err(AppError::BadRequest(_))));

    let mine = order_service::list_my_orders(&state, &merchant, OrderListQuery::default())
        .await?
        .data
        .unwrap();
    assert_eq!(mine.items.len(), 1);
    assert!(mine.items[0].product.is_some());

    // Favorites
    let added = favorite_service::add_favorite(&state, &merchant, producer.user_id).await?;
    assert_eq!(added.data.map(|p| p.id), Some(producer.user_id));
    let duplicate = favorite_service::add_favorite(&state, &merchant, producer.user_id).await;
    assert!(matches!(duplicate, Err(AppError::BadRequest(msg)) if msg == "Already in favorites"));
    let not_producer = favorite_service::add_favorite(&state, &merchant, merchant.user_id).await;
    assert!(matches!(not_producer, Err(AppError::NotFound)));

    let check = favorite_service::check_favorite(&state, &merchant, producer.user_id).await?;
    assert!(check.data.unwrap().is_favorite);
    favorite_service::remove_favorite(&state, &merchant, producer.user_id).await?;
    let missing = favorite_service::remove_favorite(&state, &merchant, producer.user_id).await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    // Wildcards in a search term match literally
    let wildcard = product_service::list_products(
        &state,
        ProductQuery {
            q: Some("%".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert!(wildcard.items.is_empty());

    // A blank description clears it
    let cleared = product_service::update_product(
        &state,
        &producer,
        product.id,
        UpdateProductRequest {
            description: Some("  ".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cleared.description, None);
    assert_eq!(cleared.title, "Riz local");

    stock_is_checked_again_on_acceptance(&state, &producer, &merchant).await?;
    chatbot_falls_back_when_the_advisor_is_unavailable(&state).await?;
    chatbot_stream_stores_the_relayed_reply(&state).await?;

    Ok(())
}

/// Two orders fit the stock on their own but not together; the second
/// acceptance fails and leaves everything as it was.
async fn stock_is_checked_again_on_acceptance(
    state: &AppState,
    producer: &AuthUser,
    merchant: &AuthUser,
) -> anyhow::Result<()> {
    let sorghum = product_service::create_product(
        state,
        producer,
        CreateProductRequest {
            title: "Sorgho blanc".into(),
            price: 500,
            quantity: 10,
            category: Category::Cereals,
            description: None,
            image: None,
        },
    )
    .await?
    .data
    .unwrap();

    let mut orders = Vec::new();
    for _ in 0..2 {
        let placed = order_service::create_order(
            state,
            merchant,
            CreateOrderRequest {
                producer_id: producer.user_id,
                product_id: sorghum.id,
                quantity: 6,
                message: None,
            },
        )
        .await?
        .data
        .unwrap();
        orders.push(placed.order.id);
    }

    assert_eq!(
        status(state, producer, orders[0], OrderStatus::Accepted).await?,
        OrderStatus::Accepted
    );
    let second = status(state, producer, orders[1], OrderStatus::Accepted).await;
    assert!(matches!(second, Err(AppError::BadRequest(msg)) if msg == "Insufficient stock"));

    let pending = order_service::get_order(state, producer, orders[1])
        .await?
        .data
        .unwrap();
    assert_eq!(pending.order.status, OrderStatus::Pending);
    let stock = Products::find_by_id(sorghum.id)
        .one(&state.orm)
        .await?
        .map(|p| p.quantity);
    assert_eq!(stock, Some(4));

    // Other producers and non-participants see none of it
    let rival = register(state, Role::Producer, "voisin@test.bf").await?;
    let foreign_status = status(state, &rival, orders[1], OrderStatus::Refused).await;
    assert!(matches!(foreign_status, Err(AppError::NotFound)));
    let foreign_read = order_service::get_order(state, &rival, orders[1]).await;
    assert!(matches!(foreign_read, Err(AppError::NotFound)));
    let foreign_update = product_service::update_product(
        state,
        &rival,
        sorghum.id,
        UpdateProductRequest {
            price: Some(1),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(foreign_update, Err(AppError::NotFound)));
    let foreign_delete = product_service::delete_product(state, &rival, sorghum.id).await;
    assert!(matches!(foreign_delete, Err(AppError::NotFound)));

    // Soft-deleted products disappear from the catalog
    product_service::delete_product(state, producer, sorghum.id).await?;
    let listed = product_service::list_products(
        state,
        ProductQuery {
            q: Some("sorgho".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert!(listed.items.is_empty());
    let gone = product_service::get_product(state, sorghum.id).await;
    assert!(matches!(gone, Err(AppError::NotFound)));

    Ok(())
}

async fn drain(mut rx: mpsc::Receiver<RelayFrame>) -> Vec<RelayFrame> {
    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    frames
}

/// Streamed replies are stored once the upstream finishes, an empty one as the apology.
async fn chatbot_stream_stores_the_relayed_reply(state: &AppState) -> anyhow::Result<()> {
    let user = register(state, Role::Merchant, "flux@test.bf").await?;

    for (script, expected) in [
        (vec!["Semez ", "en juin."], "Semez en juin."),
        (vec![], FALLBACK_REPLY),
    ] {
        let streaming = AppState::new(
            state.orm.clone(),
            AppConfig::for_tests("flow-test-secret"),
            Arc::new(ScriptedAdvisor(script)),
        );
        let conversation = chat_service::create_conversation(
            &streaming,
            &user,
            CreateConversationRequest {
                title: "Calendrier".into(),
            },
        )
        .await?
        .data
        .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let rx = chat_service::stream_message(
            &streaming,
            &user,
            conversation.id,
            SendMessageRequest {
                content: "Quand semer le mil ?".into(),
            },
        )
        .await?;
        let frames = drain(rx).await;

        let (last, content) = frames.split_last().expect("at least the done frame");
        assert_eq!(
            last,
            &RelayFrame::Done {
                done: true,
                conversation_id: conversation.id,
            }
        );
        let streamed: String = content
            .iter()
            .map(|frame| match frame {
                RelayFrame::Content { content } => content.as_str(),
                other => panic!("unexpected frame {other:?}"),
            })
            .collect();
        assert_eq!(streamed, expected);

        let stored = chat_service::get_conversation(&streaming, &user, conversation.id)
            .await?
            .data
            .unwrap();
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages[0].role, MessageRole::User);
        assert_eq!(stored.messages[0].content, "Quand semer le mil ?");
        assert_eq!(stored.messages[1].role, MessageRole::Ai);
        assert_eq!(stored.messages[1].content, expected);
        assert!(stored.updated_at > conversation.updated_at);
    }

    Ok(())
}

/// Chat exchange with no advisor configured stores the apology reply.
async fn chatbot_falls_back_when_the_advisor_is_unavailable(state: &AppState) -> anyhow::Result<()> {
    let user = register(state, Role::Producer, "conseil@test.bf").await?;

    let conversation = chat_service::create_conversation(
        state,
        &user,
        CreateConversationRequest {
            title: "Saison des pluies".into(),
        },
    )
    .await?
    .data
    .unwrap();

    let updated = chat_service::send_message(
        state,
        &user,
        conversation.id,
        SendMessageRequest {
            content: "Quand semer le sorgho ?".into(),
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(updated.messages.len(), 2);
    assert_eq!(updated.messages[0].role, MessageRole::User);
    assert_eq!(updated.messages[1].role, MessageRole::Ai);
    assert_eq!(updated.messages[1].content, FALLBACK_REPLY);

    chat_service::delete_conversation(state, &user, conversation.id).await?;
    let listed = chat_service::list_conversations(state, &user)
        .await?
        .data
        .unwrap();
    assert!(listed.items.is_empty());

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE messages, conversations, favorites, orders, products, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState::new(
        orm,
        AppConfig::for_tests("flow-test-secret"),
        Arc::new(DisabledAdvisor),
    ))
}

fn register_request(role: Role, email: &str) -> RegisterRequest {
    RegisterRequest {
        first_name: "Awa".into(),
        last_name: "Zongo".into(),
        email: email.into(),
        password: "demo123".into(),
        phone: "+226 70 00 00 00".into(),
        location: "Ouagadougou".into(),
        role,
        company_name: (role == Role::Merchant).then(|| "Zongo Négoce".to_string()),
        profile_image: None,
    }
}

async fn register(state: &AppState, role: Role, email: &str) -> anyhow::Result<AuthUser> {
    let resp = auth_service::register_user(state, register_request(role, email)).await?;
    let user = resp.data.unwrap().user;
    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

async fn status(
    state: &AppState,
    user: &AuthUser,
    id: uuid::Uuid,
    status: OrderStatus,
) -> Result<OrderStatus, AppError> {
    let resp = order_service::update_order_status(
        state,
        user,
        id,
        UpdateOrderStatusRequest { status },
    )
    .await?;
    Ok(resp.data.unwrap().order.status)
}

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use agriconnect_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{products, users},
    models::{Category, Role},
    services::auth_service::hash_password,
};

const DEMO_PASSWORD: &str = "demo123";

struct DemoUser {
    email: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    phone: &'static str,
    location: &'static str,
    role: Role,
    company_name: Option<&'static str>,
}

const USERS: [DemoUser; 4] = [
    DemoUser {
        email: "producteur@demo.com",
        first_name: "Amadou",
        last_name: "Traoré",
        phone: "+226 70 12 34 56",
        location: "Ouagadougou, Centre",
        role: Role::Producer,
        company_name: None,
    },
    DemoUser {
        email: "fatou@demo.com",
        first_name: "Fatou",
        last_name: "Ouédraogo",
        phone: "+226 76 23 45 67",
        location: "Bobo-Dioulasso, Hauts-Bassins",
        role: Role::Producer,
        company_name: None,
    },
    DemoUser {
        email: "commercant@demo.com",
        first_name: "Ibrahim",
        last_name: "Sawadogo",
        phone: "+226 70 98 76 54",
        location: "Ouagadougou, Centre",
        role: Role::Merchant,
        company_name: Some("AgriCommerce BF"),
    },
    DemoUser {
        email: "aicha@demo.com",
        first_name: "Aïcha",
        last_name: "Kaboré",
        phone: "+226 76 54 32 10",
        location: "Koudougou, Centre-Ouest",
        role: Role::Merchant,
        company_name: Some("Marché Vert Koudougou"),
    },
];

// (title, description, price, quantity, category, index of the owning producer)
const PRODUCTS: [(&str, &str, i64, i32, Category, usize); 6] = [
    ("Riz local de qualité", "Riz cultivé localement, sans pesticides, excellent goût", 800, 100, Category::Cereals, 0),
    ("Tomates fraîches", "Tomates rouges et juteuses, récoltées le matin", 500, 50, Category::Vegetables, 0),
    ("Mangues sucrées", "Mangues mûres et parfumées, variété locale", 300, 80, Category::Fruits, 1),
    ("Pommes de terre", "Pommes de terre fermes, idéales pour la cuisine", 400, 60, Category::Tubers, 1),
    ("Haricots verts", "Haricots verts frais, cueillis à la main", 600, 30, Category::Legumes, 0),
    ("Piment rouge", "Piment rouge séché, très piquant", 200, 25, Category::Spices, 1),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let mut producer_ids = Vec::new();
    for user in &USERS {
        let id = ensure_user(&orm, user).await?;
        if user.role == Role::Producer {
            producer_ids.push(id);
        }
    }
    seed_products(&orm, &producer_ids).await?;

    println!("Seed completed. Demo password for every account: {DEMO_PASSWORD}");
    Ok(())
}

async fn ensure_user(orm: &DatabaseConnection, user: &DemoUser) -> anyhow::Result<Uuid> {
    let existing = users::Entity::find()
        .filter(users::Column::Email.eq(user.email))
        .one(orm)
        .await?;
    if let Some(existing) = existing {
        println!("User {} already present", user.email);
        return Ok(existing.id);
    }

    let created = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set(user.first_name.to_string()),
        last_name: Set(user.last_name.to_string()),
        email: Set(user.email.to_string()),
        password_hash: Set(hash_password(DEMO_PASSWORD)?),
        phone: Set(user.phone.to_string()),
        location: Set(user.location.to_string()),
        role: Set(user.role.as_str().to_string()),
        company_name: Set(user.company_name.map(str::to_string)),
        profile_image: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(orm)
    .await?;

    println!("Ensured user {} (role={})", user.email, user.role.as_str());
    Ok(created.id)
}

async fn seed_products(orm: &DatabaseConnection, producer_ids: &[Uuid]) -> anyhow::Result<()> {
    if producer_ids.is_empty() {
        return Ok(());
    }

    for (title, description, price, quantity, category, owner) in PRODUCTS.iter() {
        let producer_id = producer_ids[*owner % producer_ids.len()];
        let existing = products::Entity::find()
            .filter(products::Column::ProducerId.eq(producer_id))
            .filter(products::Column::Title.eq(*title))
            .one(orm)
            .await?;
        if existing.is_some() {
            continue;
        }

        products::ActiveModel {
            id: Set(Uuid::new_v4()),
            producer_id: Set(producer_id),
            title: Set(title.to_string()),
            price: Set(*price),
            quantity: Set(*quantity),
            category: Set(category.as_str().to_string()),
            description: Set(Some(description.to_string())),
            image: Set(String::new()),
            is_active: Set(true),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agriconnect_api::{
    advisor::{Advisor, DisabledAdvisor, GroqAdvisor},
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    routes::create_app,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agriconnect_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let advisor: Arc<dyn Advisor> = match GroqAdvisor::from_config(&config.advisor)? {
        Some(groq) => {
            tracing::info!(model = %config.advisor.model, "chat advisor enabled");
            Arc::new(groq)
        }
        None => {
            tracing::warn!("GROQ_API_KEY not set, chatbot replies will fall back");
            Arc::new(DisabledAdvisor)
        }
    };

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    let app = create_app(AppState::new(orm, config, advisor));

    tracing::info!("listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}

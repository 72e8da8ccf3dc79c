use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{advisor::Advisor, config::AppConfig};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub advisor: Arc<dyn Advisor>,
}

impl AppState {
    pub fn new(orm: DatabaseConnection, config: AppConfig, advisor: Arc<dyn Advisor>) -> Self {
        Self {
            orm,
            config: Arc::new(config),
            advisor,
        }
    }
}

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{bot::Messenger, config::AppConfig, services::ServiceContext};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DatabaseConnection,
    pub messenger: Arc<dyn Messenger>,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection, messenger: Arc<dyn Messenger>) -> Arc<Self> {
        Arc::new(Self {
            config,
            db,
            messenger,
        })
    }

    pub fn services(&self) -> ServiceContext {
        ServiceContext::from_state(self)
    }
}

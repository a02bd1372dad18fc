use sea_orm::DatabaseConnection;

use crate::{
    db::dao::DaoContext,
    services::{auth_service::AuthService, group_service::GroupService},
    state::AppState,
};

#[derive(Clone)]
pub struct ServiceContext {
    db: DatabaseConnection,
    daos: DaoContext,
}

impl ServiceContext {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self {
            db: db.clone(),
            daos: DaoContext::new(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(&state.db)
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.db.clone(), self.daos.auth())
    }

    pub fn group(&self) -> GroupService {
        GroupService::new(self.db.clone(), self.daos.group())
    }
}

use std::collections::BTreeSet;

use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::{
    db::{
        UnitOfWork,
        dao::{AuthDao, ClaimResult, DaoLayerError},
        entities::{action, token, user},
    },
    error::AppError,
};

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    #[serde(flatten)]
    pub token: token::Model,
    pub actions: BTreeSet<String>,
}

/// A token the user holds and what it grants.
#[derive(Debug, Clone, Serialize)]
pub struct Holding {
    pub token_id: String,
    pub actions: BTreeSet<String>,
}

/// Authorization store operations, one unit of work each.
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    dao: AuthDao,
}

impl AuthService {
    pub fn new(db: DatabaseConnection, dao: AuthDao) -> Self {
        Self { db, dao }
    }

    pub async fn create_user(&self, user_id: &str, name: &str) -> Result<user::Model, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.create_user(uow.conn(), user_id, name).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<user::Model>, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.find_user_by_id(uow.conn(), user_id).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn user_exists(&self, user_id: &str) -> Result<bool, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.user_exists(uow.conn(), user_id).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn create_token(
        &self,
        token_id: &str,
        owner: Option<&str>,
    ) -> Result<token::Model, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.create_token(uow.conn(), token_id, owner).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn find_token(&self, token_id: &str) -> Result<Option<token::Model>, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.find_token_by_id(uow.conn(), token_id).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn token_exists(&self, token_id: &str) -> Result<bool, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.token_exists(uow.conn(), token_id).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn claim_or_validate(
        &self,
        token_id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<ClaimResult, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self
            .dao
            .claim_or_validate(uow.conn(), token_id, user_id, name)
            .await;
        Ok(uow.finish(result).await?)
    }

    pub async fn revoke_token(&self, owner_id: &str, token_id: &str) -> Result<bool, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.revoke_token(uow.conn(), owner_id, token_id).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn delete_token(&self, token_id: &str) -> Result<bool, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.delete_token(uow.conn(), token_id).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn create_action(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<action::Model, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.create_action(uow.conn(), name, description).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn attach_action(&self, token_id: &str, action_name: &str) -> Result<bool, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.attach_action(uow.conn(), token_id, action_name).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn detach_action(&self, token_id: &str, action_name: &str) -> Result<bool, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.detach_action(uow.conn(), token_id, action_name).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn actions_for_user(&self, user_id: &str) -> Result<BTreeSet<String>, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.actions_for_user(uow.conn(), user_id).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn has_action(&self, user_id: &str, action_name: &str) -> Result<bool, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.has_action(uow.conn(), user_id, action_name).await;
        Ok(uow.finish(result).await?)
    }

    /// Creates a token, optionally bound to `owner`, granting `actions`.
    /// Unknown action names are defined on the fly.
    pub async fn issue_token(
        &self,
        token_id: &str,
        owner: Option<&str>,
        actions: &[String],
    ) -> Result<IssuedToken, AppError> {
        if token_id.trim().is_empty() {
            return Err(AppError::bad_request("token id must not be empty"));
        }

        let uow = UnitOfWork::begin(&self.db).await?;
        let conn = uow.conn();
        let result = async {
            if let Some(owner) = owner {
                if !self.dao.user_exists(conn, owner).await? {
                    return Ok(None);
                }
            }
            let token = self.dao.create_token(conn, token_id, owner).await?;
            for name in actions {
                self.dao.ensure_action(conn, name, None).await?;
                self.dao.attach_action(conn, token_id, name).await?;
            }
            Ok::<_, DaoLayerError>(Some(IssuedToken {
                token,
                actions: actions.iter().cloned().collect(),
            }))
        }
        .await;

        uow.finish(result).await?.ok_or_else(|| {
            AppError::not_found(format!("user {} not found", owner.unwrap_or_default()))
        })
    }

    /// The user's tokens with the actions each grants.
    pub async fn holdings(&self, user_id: &str) -> Result<Vec<Holding>, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let conn = uow.conn();
        let result = async {
            let mut holdings = Vec::new();
            for token in self.dao.tokens_for_user(conn, user_id).await? {
                let actions = self.dao.actions_for_token(conn, &token.id).await?;
                holdings.push(Holding {
                    token_id: token.id,
                    actions,
                });
            }
            Ok::<_, DaoLayerError>(holdings)
        }
        .await;
        Ok(uow.finish(result).await?)
    }
}

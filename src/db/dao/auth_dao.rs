use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict, SelectStatement};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
    QueryTrait, Set,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{DaoLayerError, DaoResult};
use crate::db::entities::prelude::{AuthAction, AuthToken, AuthUser, TokenAction};
use crate::db::entities::{action, token, token_action, user};

const USER: &str = "user";
const TOKEN: &str = "token";
const ACTION: &str = "action";

/// Outcome of presenting a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimResult {
    TokenNotFound,
    /// The presenter did not exist yet; they were created and now own the token.
    NewUserBound,
    TokenAddedToExistingUser,
    /// The presenter already claimed this token earlier.
    AlreadyRegistered,
    /// The token was issued directly to the presenter.
    OwnershipConfirmed,
    OwnershipConflict,
}

impl ClaimResult {
    pub fn is_granted(self) -> bool {
        !matches!(self, Self::TokenNotFound | Self::OwnershipConflict)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TokenNotFound => "token_not_found",
            Self::NewUserBound => "new_user_bound",
            Self::TokenAddedToExistingUser => "token_added_to_existing_user",
            Self::AlreadyRegistered => "already_registered",
            Self::OwnershipConfirmed => "ownership_confirmed",
            Self::OwnershipConflict => "ownership_conflict",
        }
    }
}

impl std::fmt::Display for ClaimResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Users, tokens and actions. Every method runs on the connection it is given
/// and never commits; the caller owns the unit of work.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthDao;

impl AuthDao {
    pub async fn create_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        name: &str,
    ) -> DaoResult<user::Model> {
        if !self.insert_user_if_absent(conn, user_id, name).await? {
            return Err(DaoLayerError::duplicate(USER, user_id));
        }
        info!(user_id, name, "created user");
        Ok(user::Model {
            id: user_id.to_string(),
            name: name.to_string(),
        })
    }

    pub async fn find_user_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> DaoResult<Option<user::Model>> {
        AuthUser::find_by_id(user_id.to_string())
            .one(conn)
            .await
            .map_err(DaoLayerError::Db)
    }

    pub async fn user_exists<C: ConnectionTrait>(&self, conn: &C, user_id: &str) -> DaoResult<bool> {
        let count = AuthUser::find_by_id(user_id.to_string())
            .count(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(count > 0)
    }

    /// Deletes a user together with its tokens and their action links.
    pub async fn delete_user<C: ConnectionTrait>(&self, conn: &C, user_id: &str) -> DaoResult<bool> {
        TokenAction::delete_many()
            .filter(token_action::Column::TokenId.in_subquery(owned_token_ids(user_id)))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        AuthToken::delete_many()
            .filter(token::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        let result = AuthUser::delete_by_id(user_id.to_string())
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;

        let deleted = result.rows_affected > 0;
        if deleted {
            info!(user_id, "deleted user");
        }
        Ok(deleted)
    }

    pub async fn create_token<C: ConnectionTrait>(
        &self,
        conn: &C,
        token_id: &str,
        owner: Option<&str>,
    ) -> DaoResult<token::Model> {
        let model = token::ActiveModel {
            id: Set(token_id.to_string()),
            user_id: Set(owner.map(str::to_string)),
            registered_at: Set(None),
            ..Default::default()
        };
        let inserted = insert_ignoring_conflict(
            AuthToken::insert(model)
                .on_conflict(OnConflict::column(token::Column::Id).do_nothing().to_owned())
                .exec_without_returning(conn)
                .await,
            TOKEN,
            token_id,
        )?;
        if !inserted {
            return Err(DaoLayerError::duplicate(TOKEN, token_id));
        }

        info!(token_id, owner, "created token");
        Ok(token::Model {
            id: token_id.to_string(),
            user_id: owner.map(str::to_string),
            registered_at: None,
        })
    }

    pub async fn find_token_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        token_id: &str,
    ) -> DaoResult<Option<token::Model>> {
        AuthToken::find_by_id(token_id.to_string())
            .one(conn)
            .await
            .map_err(DaoLayerError::Db)
    }

    pub async fn token_exists<C: ConnectionTrait>(&self, conn: &C, token_id: &str) -> DaoResult<bool> {
        let count = AuthToken::find_by_id(token_id.to_string())
            .count(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(count > 0)
    }

    pub async fn tokens_for_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> DaoResult<Vec<token::Model>> {
        AuthToken::find()
            .filter(token::Column::UserId.eq(user_id))
            .all(conn)
            .await
            .map_err(DaoLayerError::Db)
    }

    /// Registers `token_id` for the presenting identity, or checks that the
    /// presenter already owns it.
    ///
    /// Binding an unclaimed token is a single conditional update guarded by
    /// `user_id IS NULL`, so two presenters racing for the same token cannot
    /// both win. The loser observes the winner's ownership instead.
    pub async fn claim_or_validate<C: ConnectionTrait>(
        &self,
        conn: &C,
        token_id: &str,
        presenting_user_id: &str,
        presenting_name: &str,
    ) -> DaoResult<ClaimResult> {
        let Some(token) = self.find_token_by_id(conn, token_id).await? else {
            warn!(token_id, user_id = presenting_user_id, "presented token does not exist");
            return Ok(ClaimResult::TokenNotFound);
        };

        if token.is_claimed() {
            let result = validate_owner(&token, presenting_user_id);
            log_claim(token_id, presenting_user_id, result);
            return Ok(result);
        }

        let created = self
            .insert_user_if_absent(conn, presenting_user_id, presenting_name)
            .await?;
        if created {
            info!(user_id = presenting_user_id, name = presenting_name, "created user");
        }

        if self.bind_unclaimed(conn, token_id, presenting_user_id).await? {
            let result = if created {
                ClaimResult::NewUserBound
            } else {
                ClaimResult::TokenAddedToExistingUser
            };
            log_claim(token_id, presenting_user_id, result);
            return Ok(result);
        }

        // Somebody else bound or removed the token between our read and update.
        let result = match self.find_token_by_id(conn, token_id).await? {
            None => ClaimResult::TokenNotFound,
            Some(token) if token.is_owned_by(presenting_user_id) => ClaimResult::AlreadyRegistered,
            Some(_) => ClaimResult::OwnershipConflict,
        };
        if created && result != ClaimResult::AlreadyRegistered {
            AuthUser::delete_by_id(presenting_user_id.to_string())
                .exec(conn)
                .await
                .map_err(DaoLayerError::Db)?;
            debug!(user_id = presenting_user_id, "dropped user created for a lost claim");
        }
        log_claim(token_id, presenting_user_id, result);
        Ok(result)
    }

    /// Deletes `token_id` if `owner_id` owns it. Tokens that are missing or
    /// belong to someone else are left alone and reported as `false`.
    pub async fn revoke_token<C: ConnectionTrait>(
        &self,
        conn: &C,
        owner_id: &str,
        token_id: &str,
    ) -> DaoResult<bool> {
        let Some(token) = self.find_token_by_id(conn, token_id).await? else {
            info!(token_id, owner_id, "tried to revoke a token that does not exist");
            return Ok(false);
        };
        if !token.is_owned_by(owner_id) {
            warn!(
                token_id,
                owner_id,
                actual_owner = token.user_id.as_deref(),
                "refusing to revoke a token owned by someone else"
            );
            return Ok(false);
        }

        TokenAction::delete_many()
            .filter(token_action::Column::TokenId.eq(token_id))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        let result = AuthToken::delete_many()
            .filter(token::Column::Id.eq(token_id))
            .filter(token::Column::UserId.eq(owner_id))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;

        let revoked = result.rows_affected > 0;
        if revoked {
            info!(token_id, owner_id, "revoked token");
        }
        Ok(revoked)
    }

    /// Deletes a token regardless of owner.
    pub async fn delete_token<C: ConnectionTrait>(&self, conn: &C, token_id: &str) -> DaoResult<bool> {
        TokenAction::delete_many()
            .filter(token_action::Column::TokenId.eq(token_id))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        let result = AuthToken::delete_by_id(token_id.to_string())
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;

        let deleted = result.rows_affected > 0;
        if deleted {
            info!(token_id, "deleted token");
        }
        Ok(deleted)
    }

    pub async fn create_action<C: ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
        description: Option<&str>,
    ) -> DaoResult<action::Model> {
        if !self.insert_action_if_absent(conn, name, description).await? {
            return Err(DaoLayerError::duplicate(ACTION, name));
        }
        info!(action = name, "created action");
        Ok(action::Model {
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    /// Creates the action unless it already exists. Returns whether it was created.
    pub async fn ensure_action<C: ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
        description: Option<&str>,
    ) -> DaoResult<bool> {
        self.insert_action_if_absent(conn, name, description).await
    }

    pub async fn find_action<C: ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
    ) -> DaoResult<Option<action::Model>> {
        AuthAction::find_by_id(name.to_string())
            .one(conn)
            .await
            .map_err(DaoLayerError::Db)
    }

    /// Links an action to a token. Returns `false` when the link already existed.
    pub async fn attach_action<C: ConnectionTrait>(
        &self,
        conn: &C,
        token_id: &str,
        action_name: &str,
    ) -> DaoResult<bool> {
        let model = token_action::ActiveModel {
            token_id: Set(token_id.to_string()),
            action_name: Set(action_name.to_string()),
            ..Default::default()
        };
        let attached = insert_ignoring_conflict(
            TokenAction::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        token_action::Column::TokenId,
                        token_action::Column::ActionName,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(conn)
                .await,
            "token_action",
            format!("{token_id}/{action_name}"),
        )?;
        debug!(token_id, action = action_name, attached, "attach action");
        Ok(attached)
    }

    /// Unlinks an action from a token. Returns `false` when there was no link.
    pub async fn detach_action<C: ConnectionTrait>(
        &self,
        conn: &C,
        token_id: &str,
        action_name: &str,
    ) -> DaoResult<bool> {
        let result = TokenAction::delete_many()
            .filter(token_action::Column::TokenId.eq(token_id))
            .filter(token_action::Column::ActionName.eq(action_name))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        let detached = result.rows_affected > 0;
        debug!(token_id, action = action_name, detached, "detach action");
        Ok(detached)
    }

    pub async fn actions_for_token<C: ConnectionTrait>(
        &self,
        conn: &C,
        token_id: &str,
    ) -> DaoResult<BTreeSet<String>> {
        let rows = TokenAction::find()
            .filter(token_action::Column::TokenId.eq(token_id))
            .all(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(rows.into_iter().map(|row| row.action_name).collect())
    }

    /// Union of the actions granted by every token the user currently holds.
    pub async fn actions_for_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> DaoResult<BTreeSet<String>> {
        let rows = TokenAction::find()
            .filter(token_action::Column::TokenId.in_subquery(owned_token_ids(user_id)))
            .all(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(rows.into_iter().map(|row| row.action_name).collect())
    }

    pub async fn has_action<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        action_name: &str,
    ) -> DaoResult<bool> {
        let count = TokenAction::find()
            .filter(token_action::Column::ActionName.eq(action_name))
            .filter(token_action::Column::TokenId.in_subquery(owned_token_ids(user_id)))
            .count(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(count > 0)
    }

    async fn insert_user_if_absent<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        name: &str,
    ) -> DaoResult<bool> {
        let model = user::ActiveModel {
            id: Set(user_id.to_string()),
            name: Set(name.to_string()),
            ..Default::default()
        };
        insert_ignoring_conflict(
            AuthUser::insert(model)
                .on_conflict(OnConflict::column(user::Column::Id).do_nothing().to_owned())
                .exec_without_returning(conn)
                .await,
            USER,
            user_id,
        )
    }

    async fn insert_action_if_absent<C: ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
        description: Option<&str>,
    ) -> DaoResult<bool> {
        let model = action::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description.map(str::to_string)),
            ..Default::default()
        };
        insert_ignoring_conflict(
            AuthAction::insert(model)
                .on_conflict(OnConflict::column(action::Column::Name).do_nothing().to_owned())
                .exec_without_returning(conn)
                .await,
            ACTION,
            name,
        )
    }

    async fn bind_unclaimed<C: ConnectionTrait>(
        &self,
        conn: &C,
        token_id: &str,
        user_id: &str,
    ) -> DaoResult<bool> {
        let result = AuthToken::update_many()
            .col_expr(token::Column::UserId, Expr::value(user_id.to_string()))
            .col_expr(
                token::Column::RegisteredAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(token::Column::Id.eq(token_id))
            .filter(token::Column::UserId.is_null())
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected > 0)
    }
}

fn owned_token_ids(user_id: &str) -> SelectStatement {
    AuthToken::find()
        .select_only()
        .column(token::Column::Id)
        .filter(token::Column::UserId.eq(user_id))
        .into_query()
}

/// Interprets the row count of an `ON CONFLICT DO NOTHING` insert.
pub(super) fn insert_ignoring_conflict(
    result: Result<u64, DbErr>,
    entity: &'static str,
    id: impl Into<String>,
) -> DaoResult<bool> {
    match result {
        Ok(rows) => Ok(rows > 0),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(err) => Err(DaoLayerError::from_insert(err, entity, id)),
    }
}

fn validate_owner(token: &token::Model, presenting_user_id: &str) -> ClaimResult {
    if !token.is_owned_by(presenting_user_id) {
        ClaimResult::OwnershipConflict
    } else if token.registered_at.is_some() {
        ClaimResult::AlreadyRegistered
    } else {
        ClaimResult::OwnershipConfirmed
    }
}

fn log_claim(token_id: &str, user_id: &str, result: ClaimResult) {
    match result {
        ClaimResult::OwnershipConflict => {
            warn!(token_id, user_id, %result, "token belongs to another user")
        }
        ClaimResult::TokenNotFound => warn!(token_id, user_id, %result, "token vanished"),
        ClaimResult::AlreadyRegistered => {
            info!(token_id, user_id, %result, "nothing to do, token already registered")
        }
        _ => info!(token_id, user_id, %result, "token accepted"),
    }
}

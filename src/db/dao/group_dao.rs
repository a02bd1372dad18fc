use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::{OnConflict, SelectStatement};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::auth_dao::insert_ignoring_conflict;
use super::{DaoLayerError, DaoResult};
use crate::db::entities::prelude::{Group, GroupMember, Member};
use crate::db::entities::{group, group_member, member};

#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    pub telegram_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberSummary {
    #[serde(flatten)]
    pub member: member::Model,
    pub groups_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberDetail {
    #[serde(flatten)]
    pub member: member::Model,
    pub groups: Vec<group::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    #[serde(flatten)]
    pub group: group::Model,
    pub members_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: group::Model,
    pub members: Vec<member::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupCreated {
    #[serde(flatten)]
    pub group: group::Model,
    pub members_added: u64,
}

/// Groups of chat members. Same contract as [`super::AuthDao`]: explicit
/// connection, no commits.
#[derive(Clone, Copy, Debug, Default)]
pub struct GroupDao;

impl GroupDao {
    pub async fn create_member<C: ConnectionTrait>(
        &self,
        conn: &C,
        new: NewMember,
    ) -> DaoResult<member::Model> {
        let now = Utc::now().fixed_offset();
        let model = member::ActiveModel {
            telegram_id: Set(new.telegram_id),
            username: Set(new.username.clone()),
            first_name: Set(new.first_name.clone()),
            last_name: Set(new.last_name.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let inserted = insert_ignoring_conflict(
            Member::insert(model)
                .on_conflict(
                    OnConflict::column(member::Column::TelegramId)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(conn)
                .await,
            "member",
            new.telegram_id.to_string(),
        )?;
        if !inserted {
            return Err(DaoLayerError::duplicate("member", new.telegram_id.to_string()));
        }

        info!(telegram_id = new.telegram_id, "created member");
        Ok(member::Model {
            telegram_id: new.telegram_id,
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_member<C: ConnectionTrait>(
        &self,
        conn: &C,
        telegram_id: i64,
    ) -> DaoResult<Option<member::Model>> {
        Member::find_by_id(telegram_id)
            .one(conn)
            .await
            .map_err(DaoLayerError::Db)
    }

    pub async fn member_detail<C: ConnectionTrait>(
        &self,
        conn: &C,
        telegram_id: i64,
    ) -> DaoResult<Option<MemberDetail>> {
        let Some(member) = self.find_member(conn, telegram_id).await? else {
            return Ok(None);
        };
        let groups = Group::find()
            .filter(group::Column::Id.in_subquery(group_ids_of_member(telegram_id)))
            .order_by_asc(group::Column::Name)
            .all(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(Some(MemberDetail { member, groups }))
    }

    pub async fn list_members<C: ConnectionTrait>(&self, conn: &C) -> DaoResult<Vec<MemberSummary>> {
        let members = Member::find()
            .order_by_asc(member::Column::TelegramId)
            .all(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        let memberships = self.memberships(conn).await?;

        let mut counts: HashMap<i64, u64> = HashMap::new();
        for link in &memberships {
            *counts.entry(link.telegram_id).or_default() += 1;
        }

        Ok(members
            .into_iter()
            .map(|member| MemberSummary {
                groups_count: counts.get(&member.telegram_id).copied().unwrap_or(0),
                member,
            })
            .collect())
    }

    /// Creates a group and adds the listed members. Unknown member ids are
    /// skipped; a taken name is a [`DaoLayerError::Duplicate`].
    pub async fn create_group<C: ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
        description: Option<&str>,
        member_ids: &[i64],
    ) -> DaoResult<GroupCreated> {
        let now = Utc::now().fixed_offset();
        let model = group::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        let active = group::ActiveModel {
            id: Set(model.id),
            name: Set(model.name.clone()),
            description: Set(model.description.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let inserted = insert_ignoring_conflict(
            Group::insert(active)
                .on_conflict(OnConflict::column(group::Column::Name).do_nothing().to_owned())
                .exec_without_returning(conn)
                .await,
            "group",
            name,
        )?;
        if !inserted {
            return Err(DaoLayerError::duplicate("group", name));
        }

        let mut members_added = 0;
        for &telegram_id in member_ids {
            if !self.member_exists(conn, telegram_id).await? {
                warn!(telegram_id, group = name, "member not found, skipping");
                continue;
            }
            if self.link(conn, model.id, telegram_id).await? {
                members_added += 1;
            }
        }

        info!(group_id = %model.id, group = name, members_added, "created group");
        Ok(GroupCreated {
            group: model,
            members_added,
        })
    }

    /// Deletes a group and its membership rows. Members themselves stay.
    pub async fn delete_group<C: ConnectionTrait>(&self, conn: &C, group_id: Uuid) -> DaoResult<bool> {
        GroupMember::delete_many()
            .filter(group_member::Column::GroupId.eq(group_id))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        let result = Group::delete_by_id(group_id)
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;

        let deleted = result.rows_affected > 0;
        if deleted {
            info!(%group_id, "deleted group");
        } else {
            warn!(%group_id, "group not found");
        }
        Ok(deleted)
    }

    /// Returns `false` when the group or member is unknown; `true` when the
    /// member is in the group afterwards, including when it already was.
    pub async fn add_member_to_group<C: ConnectionTrait>(
        &self,
        conn: &C,
        group_id: Uuid,
        telegram_id: i64,
    ) -> DaoResult<bool> {
        if !self.both_exist(conn, group_id, telegram_id).await? {
            return Ok(false);
        }
        if self.link(conn, group_id, telegram_id).await? {
            info!(%group_id, telegram_id, "added member to group");
        } else {
            info!(%group_id, telegram_id, "member is already in the group");
        }
        Ok(true)
    }

    pub async fn remove_member_from_group<C: ConnectionTrait>(
        &self,
        conn: &C,
        group_id: Uuid,
        telegram_id: i64,
    ) -> DaoResult<bool> {
        if !self.both_exist(conn, group_id, telegram_id).await? {
            return Ok(false);
        }
        let result = GroupMember::delete_many()
            .filter(group_member::Column::GroupId.eq(group_id))
            .filter(group_member::Column::TelegramId.eq(telegram_id))
            .exec(conn)
            .await
            .map_err(DaoLayerError::Db)?;

        if result.rows_affected == 0 {
            warn!(%group_id, telegram_id, "member is not in the group");
            return Ok(false);
        }
        info!(%group_id, telegram_id, "removed member from group");
        Ok(true)
    }

    pub async fn list_groups<C: ConnectionTrait>(&self, conn: &C) -> DaoResult<Vec<GroupSummary>> {
        let groups = Group::find()
            .order_by_asc(group::Column::Name)
            .all(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        let memberships = self.memberships(conn).await?;

        let mut counts: HashMap<Uuid, u64> = HashMap::new();
        for link in &memberships {
            *counts.entry(link.group_id).or_default() += 1;
        }

        Ok(groups
            .into_iter()
            .map(|group| GroupSummary {
                members_count: counts.get(&group.id).copied().unwrap_or(0),
                group,
            })
            .collect())
    }

    pub async fn group_detail_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        group_id: Uuid,
    ) -> DaoResult<Option<GroupDetail>> {
        let group = Group::find_by_id(group_id)
            .one(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        self.with_members(conn, group).await
    }

    pub async fn group_detail_by_name<C: ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
    ) -> DaoResult<Option<GroupDetail>> {
        let group = Group::find()
            .filter(group::Column::Name.eq(name))
            .one(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        self.with_members(conn, group).await
    }

    async fn with_members<C: ConnectionTrait>(
        &self,
        conn: &C,
        group: Option<group::Model>,
    ) -> DaoResult<Option<GroupDetail>> {
        let Some(group) = group else {
            return Ok(None);
        };
        let members = Member::find()
            .filter(member::Column::TelegramId.in_subquery(member_ids_of_group(group.id)))
            .order_by_asc(member::Column::TelegramId)
            .all(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(Some(GroupDetail { group, members }))
    }

    async fn memberships<C: ConnectionTrait>(&self, conn: &C) -> DaoResult<Vec<group_member::Model>> {
        GroupMember::find()
            .all(conn)
            .await
            .map_err(DaoLayerError::Db)
    }

    async fn member_exists<C: ConnectionTrait>(&self, conn: &C, telegram_id: i64) -> DaoResult<bool> {
        let count = Member::find_by_id(telegram_id)
            .count(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(count > 0)
    }

    async fn group_exists<C: ConnectionTrait>(&self, conn: &C, group_id: Uuid) -> DaoResult<bool> {
        let count = Group::find_by_id(group_id)
            .count(conn)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(count > 0)
    }

    async fn both_exist<C: ConnectionTrait>(
        &self,
        conn: &C,
        group_id: Uuid,
        telegram_id: i64,
    ) -> DaoResult<bool> {
        if !self.group_exists(conn, group_id).await? {
            warn!(%group_id, "group not found");
            return Ok(false);
        }
        if !self.member_exists(conn, telegram_id).await? {
            warn!(telegram_id, "member not found");
            return Ok(false);
        }
        Ok(true)
    }

    async fn link<C: ConnectionTrait>(&self, conn: &C, group_id: Uuid, telegram_id: i64) -> DaoResult<bool> {
        let model = group_member::ActiveModel {
            group_id: Set(group_id),
            telegram_id: Set(telegram_id),
            ..Default::default()
        };
        insert_ignoring_conflict(
            GroupMember::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        group_member::Column::GroupId,
                        group_member::Column::TelegramId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(conn)
                .await,
            "group_member",
            format!("{group_id}/{telegram_id}"),
        )
    }
}

fn group_ids_of_member(telegram_id: i64) -> SelectStatement {
    GroupMember::find()
        .select_only()
        .column(group_member::Column::GroupId)
        .filter(group_member::Column::TelegramId.eq(telegram_id))
        .into_query()
}

fn member_ids_of_group(group_id: Uuid) -> SelectStatement {
    GroupMember::find()
        .select_only()
        .column(group_member::Column::TelegramId)
        .filter(group_member::Column::GroupId.eq(group_id))
        .into_query()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use uuid::Uuid;

    use super::{GroupDao, NewMember};
    use crate::db::dao::DaoLayerError;
    use crate::db::entities::group;

    fn rows(n: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: n,
        }
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    #[tokio::test]
    async fn create_member_rejects_known_telegram_id() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([rows(0)])
            .into_connection();

        let err = GroupDao
            .create_member(
                &db,
                NewMember {
                    telegram_id: 42,
                    username: Some("alice".to_string()),
                    first_name: None,
                    last_name: None,
                },
            )
            .await
            .expect_err("duplicate member should be rejected");
        assert!(matches!(err, DaoLayerError::Duplicate { entity: "member", .. }));
    }

    #[tokio::test]
    async fn create_group_rejects_taken_name() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([rows(0)])
            .into_connection();

        let err = GroupDao
            .create_group(&db, "math", None, &[])
            .await
            .expect_err("duplicate group should be rejected");
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn create_group_skips_unknown_members() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([rows(1), rows(1)])
            .append_query_results([[count_row(1)], [count_row(0)]])
            .into_connection();

        let created = GroupDao
            .create_group(&db, "math", Some("algebra"), &[1, 2])
            .await
            .expect("group should be created");
        assert_eq!(created.group.name, "math");
        assert_eq!(created.members_added, 1);
    }

    #[tokio::test]
    async fn add_member_returns_false_for_unknown_group() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[count_row(0)]])
            .into_connection();

        let added = GroupDao
            .add_member_to_group(&db, Uuid::new_v4(), 7)
            .await
            .expect("lookup should succeed");
        assert!(!added);
    }

    #[tokio::test]
    async fn group_detail_returns_none_when_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<group::Model>::new()])
            .into_connection();

        let detail = GroupDao
            .group_detail_by_name(&db, "missing")
            .await
            .expect("query should succeed");
        assert!(detail.is_none());
    }
}

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::{
    db::{
        UnitOfWork,
        dao::{
            GroupCreated, GroupDao, GroupDetail, GroupSummary, MemberDetail, MemberSummary,
            NewMember,
        },
        entities::member,
    },
    error::AppError,
};

#[derive(Clone)]
pub struct GroupService {
    db: DatabaseConnection,
    dao: GroupDao,
}

impl GroupService {
    pub fn new(db: DatabaseConnection, dao: GroupDao) -> Self {
        Self { db, dao }
    }

    pub async fn create_member(&self, new: NewMember) -> Result<member::Model, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.create_member(uow.conn(), new).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn member_detail(&self, telegram_id: i64) -> Result<MemberDetail, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.member_detail(uow.conn(), telegram_id).await;
        uow.finish(result)
            .await?
            .ok_or_else(|| AppError::not_found(format!("member {telegram_id} not found")))
    }

    pub async fn list_members(&self) -> Result<Vec<MemberSummary>, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.list_members(uow.conn()).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        member_ids: &[i64],
    ) -> Result<GroupCreated, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("group name must not be empty"));
        }
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self
            .dao
            .create_group(uow.conn(), name, description, member_ids)
            .await;
        Ok(uow.finish(result).await?)
    }

    pub async fn delete_group(&self, group_id: Uuid) -> Result<(), AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.delete_group(uow.conn(), group_id).await;
        if !uow.finish(result).await? {
            return Err(AppError::not_found(format!("group {group_id} not found")));
        }
        Ok(())
    }

    pub async fn add_member_to_group(&self, group_id: Uuid, telegram_id: i64) -> Result<bool, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self
            .dao
            .add_member_to_group(uow.conn(), group_id, telegram_id)
            .await;
        Ok(uow.finish(result).await?)
    }

    pub async fn remove_member_from_group(
        &self,
        group_id: Uuid,
        telegram_id: i64,
    ) -> Result<bool, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self
            .dao
            .remove_member_from_group(uow.conn(), group_id, telegram_id)
            .await;
        Ok(uow.finish(result).await?)
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupSummary>, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.list_groups(uow.conn()).await;
        Ok(uow.finish(result).await?)
    }

    pub async fn group_by_id(&self, group_id: Uuid) -> Result<GroupDetail, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.group_detail_by_id(uow.conn(), group_id).await;
        uow.finish(result)
            .await?
            .ok_or_else(|| AppError::not_found(format!("group {group_id} not found")))
    }

    pub async fn group_by_name(&self, name: &str) -> Result<GroupDetail, AppError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let result = self.dao.group_detail_by_name(uow.conn(), name).await;
        uow.finish(result)
            .await?
            .ok_or_else(|| AppError::not_found(format!("group '{name}' not found")))
    }
}

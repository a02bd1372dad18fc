use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, DeriveEntityModel)]
#[sea_orm(table_name = "group_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, indexed)]
    pub group_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false, indexed)]
    pub telegram_id: i64,
    #[sea_orm(belongs_to, from = "group_id", to = "id", on_delete = "Cascade")]
    pub group: HasOne<super::group::Entity>,
    #[sea_orm(belongs_to, from = "telegram_id", to = "telegram_id", on_delete = "Cascade")]
    pub member: HasOne<super::member::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;

/// Join row granting an action through a token. Deleting a token removes its
/// rows here; the action definitions stay.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, DeriveEntityModel)]
#[sea_orm(table_name = "token_action")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, indexed)]
    pub token_id: String,
    #[sea_orm(primary_key, auto_increment = false, indexed)]
    pub action_name: String,
    #[sea_orm(belongs_to, from = "token_id", to = "id", on_delete = "Cascade")]
    pub token: HasOne<super::token::Entity>,
    #[sea_orm(belongs_to, from = "action_name", to = "name", on_delete = "Cascade")]
    pub action: HasOne<super::action::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}

#[allow(unused_imports)]
pub mod prelude {
    pub use super::action::Entity as AuthAction;
    pub use super::group::Entity as Group;
    pub use super::group_member::Entity as GroupMember;
    pub use super::member::Entity as Member;
    pub use super::token::Entity as AuthToken;
    pub use super::token_action::Entity as TokenAction;
    pub use super::user::Entity as AuthUser;
}

pub mod action;
pub mod group;
pub mod group_member;
pub mod member;
pub mod token;
pub mod token_action;
pub mod user;

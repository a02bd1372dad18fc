pub mod auth_dao;
mod context;
pub mod error;
pub mod group_dao;

pub use auth_dao::{AuthDao, ClaimResult};
pub use context::DaoContext;
pub use error::{DaoLayerError, DaoResult};
pub use group_dao::{
    GroupCreated, GroupDao, GroupDetail, GroupSummary, MemberDetail, MemberSummary, NewMember,
};

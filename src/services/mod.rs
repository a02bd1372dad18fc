pub mod auth_service;
pub mod context;
pub mod group_service;

pub use auth_service::{AuthService, Holding, IssuedToken};
pub use context::ServiceContext;
pub use group_service::GroupService;

use super::{AuthDao, GroupDao};

/// Hands out the stateless DAOs. Connections are passed per call so every
/// operation runs inside the caller's unit of work.
#[derive(Clone, Copy, Default)]
pub struct DaoContext;

impl DaoContext {
    pub fn new() -> Self {
        Self
    }

    pub fn auth(&self) -> AuthDao {
        AuthDao
    }

    pub fn group(&self) -> GroupDao {
        GroupDao
    }
}

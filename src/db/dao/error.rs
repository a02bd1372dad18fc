use sea_orm::{DbErr, SqlErr};
use std::fmt;

#[derive(Debug)]
pub enum DaoLayerError {
    Db(DbErr),
    /// A row with this identity already exists.
    Duplicate { entity: &'static str, id: String },
}

pub type DaoResult<T> = Result<T, DaoLayerError>;

impl DaoLayerError {
    pub fn duplicate(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            id: id.into(),
        }
    }

    /// Maps an insert failure, turning unique-constraint violations reported
    /// by the database into [`DaoLayerError::Duplicate`].
    pub fn from_insert(err: DbErr, entity: &'static str, id: impl Into<String>) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::duplicate(entity, id),
            _ => Self::Db(err),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

impl fmt::Display for DaoLayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoLayerError::Db(err) => write!(f, "Database error: {err}"),
            DaoLayerError::Duplicate { entity, id } => {
                write!(f, "{entity} already exists (id={id})")
            }
        }
    }
}

impl std::error::Error for DaoLayerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DaoLayerError::Db(err) => Some(err),
            DaoLayerError::Duplicate { .. } => None,
        }
    }
}

impl From<DbErr> for DaoLayerError {
    fn from(err: DbErr) -> Self {
        DaoLayerError::Db(err)
    }
}

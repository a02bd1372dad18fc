use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::error;

use super::dao::{DaoLayerError, DaoResult};

/// One transaction per store operation. Nothing is visible to other
/// connections until [`UnitOfWork::commit`]; dropping it rolls back.
pub struct UnitOfWork {
    txn: DatabaseTransaction,
}

impl UnitOfWork {
    pub async fn begin(db: &DatabaseConnection) -> DaoResult<Self> {
        let txn = db.begin().await.map_err(DaoLayerError::Db)?;
        Ok(Self { txn })
    }

    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> DaoResult<()> {
        self.txn.commit().await.map_err(DaoLayerError::Db)
    }

    pub async fn rollback(self) -> DaoResult<()> {
        self.txn.rollback().await.map_err(DaoLayerError::Db)
    }

    /// Commits on `Ok`, rolls back on `Err` and hands the result through.
    /// A failed rollback is logged; the original error wins.
    pub async fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<DaoLayerError>,
    {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::UnitOfWork;
    use crate::db::dao::DaoLayerError;

    #[tokio::test]
    async fn finish_commits_successful_work() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let uow = UnitOfWork::begin(&db).await.expect("begin should succeed");
        let value = uow
            .finish(Ok::<_, DaoLayerError>(7))
            .await
            .expect("commit should succeed");

        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn finish_returns_the_original_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let uow = UnitOfWork::begin(&db).await.expect("begin should succeed");
        let err = uow
            .finish::<(), _>(Err(DaoLayerError::duplicate("user", "alice")))
            .await
            .expect_err("error should pass through");

        assert!(err.is_duplicate());
    }
}

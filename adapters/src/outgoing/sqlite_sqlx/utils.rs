use pixel_hawk_application::error::{AppError, AppResult};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::{future::Future, time::Duration};
use tokio::time::timeout;

#[derive(Clone, Copy)]
pub struct SqliteExecutor {
    timeout_secs: u64,
}

impl SqliteExecutor {
    #[must_use]
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    pub async fn execute_with_timeout<T, F, Fut>(
        &self,
        operation: F,
        error_context: &str,
    ) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        timeout(Duration::from_secs(self.timeout_secs), operation())
            .await
            .map_err(|_| AppError::Store {
                message: format!("{}: query timed out", error_context),
            })?
            .map_err(|e| AppError::Store {
                message: format!("{}: {}", error_context, e),
            })
    }
}

pub async fn begin_transaction(pool: &SqlitePool) -> AppResult<Transaction<'_, Sqlite>> {
    pool.begin().await.map_err(|e| AppError::Store {
        message: format!("Failed to begin transaction: {}", e),
    })
}

pub async fn commit_transaction(tx: Transaction<'_, Sqlite>) -> AppResult<()> {
    tx.commit().await.map_err(|e| AppError::Store {
        message: format!("Failed to commit transaction: {}", e),
    })
}

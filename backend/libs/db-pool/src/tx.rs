use crate::PoolError;
use futures::future::{BoxFuture, FutureExt};
use sqlx::{PgPool, Postgres, Transaction};
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use tracing::{error, warn};

/// Run `f` inside a transaction
///
/// Commits when `f` returns `Ok`. Rolls back when `f` returns `Err` or
/// panics; a panic is resumed once the rollback finished. A failed rollback
/// is logged and the error from `f` is returned unchanged.
///
/// ```rust,no_run
/// # use db_pool::{with_tx, PoolError};
/// # async fn example(pool: sqlx::PgPool) -> Result<(), PoolError> {
/// let id: i64 = with_tx(&pool, |tx| {
///     Box::pin(async move {
///         let (id,): (i64,) = sqlx::query_as("INSERT INTO orders DEFAULT VALUES RETURNING id")
///             .fetch_one(&mut **tx)
///             .await?;
///         Ok::<_, PoolError>(id)
///     })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_tx<F, T, E>(pool: &PgPool, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut Transaction<'static, Postgres>) -> BoxFuture<'c, Result<T, E>>,
    E: From<PoolError> + Display,
{
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| E::from(PoolError::Begin(e)))?;

    // `f` is invoked inside the guarded future so a panic while building
    // the future is caught as well
    let outcome = AssertUnwindSafe(async { f(&mut tx).await })
        .catch_unwind()
        .await;

    finish(tx, outcome).await
}

/// Commit or roll back depending on how the transaction body ended
pub(crate) async fn finish<T, E>(
    tx: Transaction<'static, Postgres>,
    outcome: std::thread::Result<Result<T, E>>,
) -> Result<T, E>
where
    E: From<PoolError> + Display,
{
    match outcome {
        Ok(Ok(value)) => {
            tx.commit()
                .await
                .map_err(|e| E::from(PoolError::Commit(e)))?;
            Ok(value)
        }
        Ok(Err(err)) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(
                    error = %rollback_err,
                    original = %err,
                    "Rollback transaction failed"
                );
            }
            Err(err)
        }
        Err(panic) => {
            warn!("Transaction closure panicked, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                error!(error = %rollback_err, "Rollback after panic failed");
            }
            std::panic::resume_unwind(panic)
        }
    }
}

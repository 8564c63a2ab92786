//! Unit of Work abstraction over transactions

use crate::tx::finish;
use crate::PoolError;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use sqlx::{PgPool, Postgres};
use std::fmt::Display;
use std::panic::AssertUnwindSafe;

/// An active transaction handed to a unit of work
///
/// In-memory implementations return `None` from [`Transaction::tx`].
pub trait Transaction: Send {
    fn tx(&mut self) -> Option<&mut sqlx::Transaction<'static, Postgres>>;
}

/// Transaction boundary around a closure
///
/// Commits when the closure returns `Ok`, rolls back otherwise.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn execute<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut dyn Transaction) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<PoolError> + Display + Send;
}

/// [`UnitOfWork`] backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct PgTransaction<'t> {
    tx: &'t mut sqlx::Transaction<'static, Postgres>,
}

impl Transaction for PgTransaction<'_> {
    fn tx(&mut self) -> Option<&mut sqlx::Transaction<'static, Postgres>> {
        Some(&mut *self.tx)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn execute<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut dyn Transaction) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<PoolError> + Display + Send,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| E::from(PoolError::Begin(e)))?;

        let outcome = AssertUnwindSafe(async {
            let mut handle = PgTransaction { tx: &mut tx };
            f(&mut handle).await
        })
        .catch_unwind()
        .await;

        finish(tx, outcome).await
    }
}

/// No-op [`UnitOfWork`] for tests
///
/// The closure runs directly and receives a transaction whose `tx()` is
/// `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryUnitOfWork;

impl InMemoryUnitOfWork {
    pub fn new() -> Self {
        Self
    }
}

struct NoopTransaction;

impl Transaction for NoopTransaction {
    fn tx(&mut self) -> Option<&mut sqlx::Transaction<'static, Postgres>> {
        None
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn execute<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut dyn Transaction) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<PoolError> + Display + Send,
    {
        let mut tx = NoopTransaction;
        f(&mut tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn transfer<U: UnitOfWork>(uow: &U, amount: i64) -> Result<i64, PoolError> {
        uow.execute(move |tx| {
            Box::pin(async move {
                if let Some(tx) = tx.tx() {
                    sqlx::query("SELECT 1").execute(&mut **tx).await?;
                }
                Ok(amount * 2)
            })
        })
        .await
    }

    #[tokio::test]
    async fn test_in_memory_runs_closure_without_transaction() {
        let uow = InMemoryUnitOfWork::new();
        let saw_tx = uow
            .execute(|tx| Box::pin(async move { Ok::<_, PoolError>(tx.tx().is_some()) }))
            .await
            .unwrap();
        assert!(!saw_tx);
    }

    #[tokio::test]
    async fn test_generic_caller_works_with_in_memory() {
        assert_eq!(transfer(&InMemoryUnitOfWork, 21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_in_memory_propagates_errors() {
        let result = InMemoryUnitOfWork
            .execute(|_tx| Box::pin(async { Err::<(), _>(PoolError::DsnRequired) }))
            .await;
        assert!(matches!(result, Err(PoolError::DsnRequired)));
    }
}

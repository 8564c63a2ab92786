use async_trait::async_trait;
use grpc_health::{HealthCheck, HealthCheckError};
use sqlx::PgPool;

/// PostgreSQL health check
///
/// Healthy when a connection can be acquired and answers `SELECT 1`.
pub struct PostgresHealthCheck {
    pool: PgPool,
}

impl PostgresHealthCheck {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for PostgresHealthCheck {
    async fn check(&self) -> grpc_health::Result<()> {
        crate::ping(&self.pool)
            .await
            .map_err(|e| HealthCheckError::database(e.to_string()))
    }
}

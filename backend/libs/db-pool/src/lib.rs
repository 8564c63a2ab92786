//! Database connection pool management
//!
//! Provides PostgreSQL pool creation, transactions with automatic
//! rollback, a Unit of Work abstraction, pool metrics, and a health check
//! for the health aggregator.

mod env_utils;
mod error;
mod health;
mod metrics;
mod tx;
mod uow;

pub use error::PoolError;
pub use health::PostgresHealthCheck;
pub use metrics::{acquire_with_metrics, PoolStats};
pub use tx::with_tx;
pub use uow::{InMemoryUnitOfWork, PgUnitOfWork, Transaction, UnitOfWork};

use env_utils::parse_env_with_default;
use metrics::{spawn_metrics_refresher, update_pool_metrics};
use serde::{Deserialize, Serialize};
use shutdown::Shutdown;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Database connection pool configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Service name for metrics labeling
    pub service_name: String,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection creation timeout (new connection to PostgreSQL)
    pub connect_timeout_secs: u64,
    /// Connection acquisition timeout (get connection from pool)
    pub acquire_timeout_secs: u64,
    /// Connection idle timeout
    pub idle_timeout_secs: u64,
    /// Connection maximum lifetime
    pub max_lifetime_secs: u64,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("service_name", &self.service_name)
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: String::new(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 1800,
            max_lifetime_secs: 3600,
        }
    }
}

impl DbConfig {
    /// Create a new DbConfig from environment variables
    ///
    /// `DATABASE_URL` is required. `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS`,
    /// `DB_CONNECT_TIMEOUT_SECS`, `DB_ACQUIRE_TIMEOUT_SECS`,
    /// `DB_IDLE_TIMEOUT_SECS` and `DB_MAX_LIFETIME_SECS` override the defaults.
    pub fn from_env(service_name: &str) -> Result<Self, PoolError> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .ok_or(PoolError::DsnRequired)?;

        let defaults = Self::default();
        Ok(Self {
            service_name: service_name.to_string(),
            database_url,
            max_connections: parse_env_with_default("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: parse_env_with_default("DB_MIN_CONNECTIONS", defaults.min_connections),
            connect_timeout_secs: parse_env_with_default(
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            ),
            acquire_timeout_secs: parse_env_with_default(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout_secs,
            ),
            idle_timeout_secs: parse_env_with_default(
                "DB_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout_secs,
            ),
            max_lifetime_secs: parse_env_with_default(
                "DB_MAX_LIFETIME_SECS",
                defaults.max_lifetime_secs,
            ),
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// Log pool configuration details
    pub fn log_config(&self) {
        info!(
            service = %self.service_name,
            max_connections = self.max_connections,
            min_connections = self.min_connections,
            connect_timeout_secs = self.connect_timeout_secs,
            acquire_timeout_secs = self.acquire_timeout_secs,
            idle_timeout_secs = self.idle_timeout_secs,
            max_lifetime_secs = self.max_lifetime_secs,
            "Database pool configuration"
        );
    }
}

/// Create a PostgreSQL connection pool
///
/// Verifies the connection with `SELECT 1` within the connect timeout,
/// starts the pool metrics refresher, and registers a shutdown handler that
/// closes the pool.
pub async fn create_pool(config: DbConfig, shutdown: &Shutdown) -> Result<PgPool, PoolError> {
    if config.database_url.is_empty() {
        return Err(PoolError::DsnRequired);
    }

    let connect_options =
        PgConnectOptions::from_str(&config.database_url).map_err(PoolError::InvalidDsn)?;

    debug!(
        service = %config.service_name,
        max = config.max_connections,
        min = config.min_connections,
        acquire_timeout_secs = config.acquire_timeout_secs,
        verify_timeout_secs = config.connect_timeout_secs,
        "Creating database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        // Timeout for acquiring a connection from the pool
        .acquire_timeout(config.acquire_timeout())
        // Close connections idle for longer than this
        .idle_timeout(config.idle_timeout())
        // Maximum lifetime of a connection (to handle stale connections)
        .max_lifetime(config.max_lifetime())
        // Test connections before returning them from the pool
        .test_before_acquire(true)
        .connect_with(connect_options)
        .await
        .map_err(PoolError::Connect)?;

    // Verify connection with connect timeout
    match tokio::time::timeout(config.connect_timeout(), ping(&pool)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(service = %config.service_name, error = %e, "Database connection verification failed");
            pool.close().await;
            return Err(e);
        }
        Err(_) => {
            error!(
                service = %config.service_name,
                timeout_secs = config.connect_timeout_secs,
                "Database connection verification timeout"
            );
            pool.close().await;
            return Err(PoolError::VerifyTimeout(config.connect_timeout_secs));
        }
    }

    update_pool_metrics(&pool, &config.service_name);
    spawn_metrics_refresher(pool.clone(), config.service_name.clone(), shutdown.token());

    let closing = pool.clone();
    let service = config.service_name.clone();
    shutdown.register(format!("postgres:{}", config.service_name), move || async move {
        closing.close().await;
        info!(service = %service, "Database pool closed");
        Ok(())
    });

    info!(
        service = %config.service_name,
        "Database pool created and verified successfully"
    );

    Ok(pool)
}

/// Check that the database answers
pub async fn ping(pool: &PgPool) -> Result<(), PoolError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(PoolError::Ping)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB_VARS: [&str; 7] = [
        "DATABASE_URL",
        "DB_MAX_CONNECTIONS",
        "DB_MIN_CONNECTIONS",
        "DB_CONNECT_TIMEOUT_SECS",
        "DB_ACQUIRE_TIMEOUT_SECS",
        "DB_IDLE_TIMEOUT_SECS",
        "DB_MAX_LIFETIME_SECS",
    ];

    fn clear_env() {
        for var in DB_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.acquire_timeout_secs, 10);
        assert_eq!(config.idle_timeout(), Duration::from_secs(30 * 60));
        assert_eq!(config.max_lifetime(), Duration::from_secs(60 * 60));
    }

    #[test]
    fn test_debug_redacts_url() {
        let config = DbConfig {
            database_url: "postgres://admin:hunter2@db/app".to_string(),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env_requires_url() {
        clear_env();
        assert!(matches!(
            DbConfig::from_env("test-service"),
            Err(PoolError::DsnRequired)
        ));
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env_without_override() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/test");

        let config = DbConfig::from_env("test-service").unwrap();
        assert_eq!(config.service_name, "test-service");
        assert_eq!(config.database_url, "postgres://localhost/test");
        assert_eq!(
            config,
            DbConfig {
                service_name: "test-service".to_string(),
                database_url: "postgres://localhost/test".to_string(),
                ..Default::default()
            }
        );

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env_overrides() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/test");
        std::env::set_var("DB_MAX_CONNECTIONS", "50");
        std::env::set_var("DB_IDLE_TIMEOUT_SECS", "120");
        std::env::set_var("DB_MIN_CONNECTIONS", "not-a-number");

        let config = DbConfig::from_env("orders").unwrap();
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.idle_timeout_secs, 120);
        assert_eq!(config.min_connections, 2);

        clear_env();
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: DbConfig =
            serde_json::from_str(r#"{"database_url": "postgres://db/app", "max_connections": 4}"#)
                .unwrap();
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 2);
    }

    #[tokio::test]
    async fn test_create_pool_requires_dsn() {
        let shutdown = Shutdown::new();
        let result = create_pool(DbConfig::default(), &shutdown).await;
        assert!(matches!(result, Err(PoolError::DsnRequired)));
        assert_eq!(shutdown.pending(), 0);
    }

    #[tokio::test]
    async fn test_create_pool_rejects_invalid_dsn() {
        let shutdown = Shutdown::new();
        let config = DbConfig {
            database_url: "not a url".to_string(),
            ..Default::default()
        };
        let result = create_pool(config, &shutdown).await;
        assert!(matches!(result, Err(PoolError::InvalidDsn(_))));
    }
}

//! Prometheus metrics for database connection pool
//!
//! Tracks pool size by state, connection acquisition latency, and errors

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

lazy_static::lazy_static! {
    /// Database connection pool size by state (total/idle/acquired/max)
    static ref DB_POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "db_pool_connections",
        "Database pool connection count by state",
        &["service", "state"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Time to acquire a connection from the pool
    static ref DB_POOL_ACQUIRE_DURATION: HistogramVec = register_histogram_vec!(
        "db_pool_acquire_duration_seconds",
        "Time to acquire connection from pool",
        &["service"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Connection acquisition errors by type
    static ref DB_POOL_CONNECTION_ERRORS: IntCounterVec = register_int_counter_vec!(
        "db_pool_connection_errors_total",
        "Connection acquisition errors",
        &["service", "error_type"]
    ).expect("Prometheus metrics registration should succeed at startup");
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: i64,
    pub idle: i64,
    pub acquired: i64,
    pub max: i64,
}

impl PoolStats {
    pub fn of(pool: &PgPool) -> Self {
        let total = pool.size() as i64;
        let idle = pool.num_idle() as i64;
        Self {
            total,
            idle,
            acquired: (total - idle).max(0),
            max: pool.options().get_max_connections() as i64,
        }
    }
}

/// Update connection pool gauges
pub(crate) fn update_pool_metrics(pool: &PgPool, service: &str) {
    record_stats(service, PoolStats::of(pool));
}

fn record_stats(service: &str, stats: PoolStats) {
    for (state, value) in [
        ("total", stats.total),
        ("idle", stats.idle),
        ("acquired", stats.acquired),
        ("max", stats.max),
    ] {
        DB_POOL_CONNECTIONS
            .with_label_values(&[service, state])
            .set(value);
    }
}

/// Refresh the pool gauges until `token` is cancelled
pub(crate) fn spawn_metrics_refresher(pool: PgPool, service: String, token: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(service = %service, "Pool metrics refresher stopped");
                    return;
                }
                _ = interval.tick() => update_pool_metrics(&pool, &service),
            }
        }
    });
}

/// Acquire a connection from the pool and record metrics
///
/// This is a drop-in replacement for `pool.acquire().await` that automatically
/// tracks acquisition latency and error rates.
///
/// # Example
/// ```no_run
/// # use db_pool::{create_pool, DbConfig, acquire_with_metrics};
/// # use shutdown::Shutdown;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = create_pool(DbConfig::from_env("test")?, &Shutdown::new()).await?;
/// let mut conn = acquire_with_metrics(&pool, "my-service").await?;
/// sqlx::query("SELECT 1").execute(&mut *conn).await?;
/// # Ok(())
/// # }
/// ```
pub async fn acquire_with_metrics(
    pool: &PgPool,
    service: &str,
) -> Result<PoolConnection<Postgres>, sqlx::Error> {
    let start = Instant::now();
    let result = pool.acquire().await;

    DB_POOL_ACQUIRE_DURATION
        .with_label_values(&[service])
        .observe(start.elapsed().as_secs_f64());

    if let Err(e) = &result {
        DB_POOL_CONNECTION_ERRORS
            .with_label_values(&[service, error_type(e)])
            .inc();
    }

    result
}

fn error_type(e: &sqlx::Error) -> &'static str {
    match e {
        sqlx::Error::PoolTimedOut => "timeout",
        sqlx::Error::PoolClosed => "closed",
        _ => "other",
    }
}

//! Health aggregator and background monitoring

use crate::checks::HealthCheck;
use crate::error::RegistrationError;
use crate::health::HealthStatus;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::server::HealthReporter;
use tracing::{debug, error, info, warn};

/// Aggregator timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Seconds between check cycles
    pub interval_secs: u64,

    /// Seconds each individual check may take
    pub timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 5,
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Outcome of one check in the latest cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub healthy: bool,
    pub error: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            healthy: true,
            error: None,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
        }
    }
}

/// Runs registered checks and reports the overall status
///
/// The overall (`""`) service status of the gRPC health service is
/// `SERVING` only when every registered check passed in the latest cycle.
/// It starts as `NOT_SERVING` until the first cycle completes.
pub struct HealthAggregator {
    config: HealthConfig,
    reporter: HealthReporter,
    checks: RwLock<BTreeMap<String, Arc<dyn HealthCheck>>>,
    serving: AtomicBool,
    last_results: RwLock<BTreeMap<String, CheckResult>>,
}

impl HealthAggregator {
    /// Create a new aggregator
    ///
    /// Returns the aggregator together with the health service to add to
    /// your gRPC server.
    pub async fn new(config: HealthConfig) -> (Arc<Self>, HealthServer<impl Health>) {
        let (mut reporter, service) = tonic_health::server::health_reporter();
        reporter
            .set_service_status("", HealthStatus::NotServing.into())
            .await;

        let aggregator = Arc::new(Self {
            config,
            reporter,
            checks: RwLock::new(BTreeMap::new()),
            serving: AtomicBool::new(false),
            last_results: RwLock::new(BTreeMap::new()),
        });

        (aggregator, service)
    }

    /// Register a named check
    ///
    /// Returns `self` so registrations can be chained with `?`.
    pub fn register(
        &self,
        name: impl Into<String>,
        check: impl HealthCheck + 'static,
    ) -> Result<&Self, RegistrationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }

        let mut checks = self.checks.write();
        if checks.contains_key(&name) {
            return Err(RegistrationError::AlreadyRegistered(name));
        }

        debug!(check = %name, "Registered health check");
        checks.insert(name, Arc::new(check));
        Ok(self)
    }

    /// Run check cycles until `token` is cancelled
    ///
    /// The first cycle starts immediately. Cancelling during a cycle aborts
    /// the checks still running and leaves the reported status untouched.
    pub async fn run(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval = ?self.config.interval(),
            timeout = ?self.config.timeout(),
            checks = self.checks.read().len(),
            "Health aggregator started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Health aggregator stopped");
                    return;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!("Health aggregator stopped during a cycle");
                            return;
                        }
                        _ = self.check_now() => {}
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on a background task
    pub fn spawn(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let aggregator = Arc::clone(self);
        tokio::spawn(async move { aggregator.run(token).await })
    }

    /// Run one cycle and update the reported status
    ///
    /// All checks run in parallel, each on its own task with the configured
    /// timeout. Errors, timeouts and panics count as unhealthy. With no
    /// registered checks the service is serving.
    pub async fn check_now(&self) -> bool {
        let checks: Vec<(String, Arc<dyn HealthCheck>)> = self
            .checks
            .read()
            .iter()
            .map(|(name, check)| (name.clone(), Arc::clone(check)))
            .collect();

        let timeout = self.config.timeout();
        let names: Vec<String> = checks.iter().map(|(name, _)| name.clone()).collect();

        // Dropping the set aborts whatever is still running
        let mut tasks = JoinSet::new();
        for (name, check) in checks {
            tasks.spawn(async move {
                let outcome =
                    tokio::time::timeout(timeout, AssertUnwindSafe(check.check()).catch_unwind())
                        .await;
                let result = match outcome {
                    Ok(Ok(Ok(()))) => CheckResult::healthy(),
                    Ok(Ok(Err(e))) => CheckResult::unhealthy(e.to_string()),
                    Ok(Err(payload)) => {
                        let panic = panic_message(payload);
                        error!(check = %name, panic = %panic, "health check panicked");
                        CheckResult::unhealthy(format!("panicked: {}", panic))
                    }
                    Err(_) => CheckResult::unhealthy(format!("timed out after {:?}", timeout)),
                };
                (name, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    results.insert(name, result);
                }
                Err(e) => error!(error = %e, "health check task failed"),
            }
        }
        for name in names {
            results
                .entry(name)
                .or_insert_with(|| CheckResult::unhealthy("check did not complete"));
        }

        let serving = results.values().all(|r| r.healthy);

        self.update_status(serving, results).await;
        serving
    }

    /// Aggregate status after the latest cycle
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    pub fn status(&self) -> HealthStatus {
        if self.is_serving() {
            HealthStatus::Serving
        } else {
            HealthStatus::NotServing
        }
    }

    /// Per-check outcomes of the latest cycle
    pub fn last_results(&self) -> BTreeMap<String, CheckResult> {
        self.last_results.read().clone()
    }

    async fn update_status(&self, serving: bool, results: BTreeMap<String, CheckResult>) {
        let changed = self.serving.swap(serving, Ordering::AcqRel) != serving;

        // HealthReporter shares its state across clones
        let mut reporter = self.reporter.clone();
        let status = if serving {
            HealthStatus::Serving
        } else {
            HealthStatus::NotServing
        };
        reporter.set_service_status("", status.into()).await;

        if changed {
            let checks: BTreeMap<&str, bool> = results
                .iter()
                .map(|(name, r)| (name.as_str(), r.healthy))
                .collect();
            if serving {
                info!(serving, checks = ?checks, "health status changed");
            } else {
                let failures: Vec<String> = results
                    .iter()
                    .filter_map(|(name, r)| r.error.as_ref().map(|e| format!("{}: {}", name, e)))
                    .collect();
                warn!(serving, checks = ?checks, failures = ?failures, "health status changed");
            }
        }

        *self.last_results.write() = results;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Health status types and conversions

/// Service health status
///
/// Represents the health state of a service or component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Service is healthy and can accept traffic
    Serving,
    /// Service is unhealthy and should not accept traffic
    NotServing,
    /// Service status is unknown (not registered)
    Unknown,
}

impl HealthStatus {
    pub fn is_serving(&self) -> bool {
        matches!(self, HealthStatus::Serving)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Serving => "SERVING",
            HealthStatus::NotServing => "NOT_SERVING",
            HealthStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HealthStatus> for tonic_health::ServingStatus {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Serving => tonic_health::ServingStatus::Serving,
            HealthStatus::NotServing => tonic_health::ServingStatus::NotServing,
            HealthStatus::Unknown => tonic_health::ServingStatus::Unknown,
        }
    }
}

impl From<tonic_health::ServingStatus> for HealthStatus {
    fn from(status: tonic_health::ServingStatus) -> Self {
        match status {
            tonic_health::ServingStatus::Serving => HealthStatus::Serving,
            tonic_health::ServingStatus::NotServing => HealthStatus::NotServing,
            tonic_health::ServingStatus::Unknown => HealthStatus::Unknown,
        }
    }
}

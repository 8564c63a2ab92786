use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A single handler that failed during shutdown
#[derive(Debug)]
pub struct HandlerError {
    pub name: String,
    pub source: anyhow::Error,
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.name, self.source)
    }
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    /// One or more handlers failed; every failure is listed
    #[error("shutdown handlers failed: {}", join(.0))]
    Handlers(Vec<HandlerError>),
}

impl ShutdownError {
    /// Failed handlers in the order they ran
    pub fn failures(&self) -> &[HandlerError] {
        match self {
            ShutdownError::Handlers(failures) => failures,
        }
    }
}

pub(crate) fn timed_out(timeout: Duration) -> anyhow::Error {
    anyhow::anyhow!("timed out after {:?}", timeout)
}

fn join(failures: &[HandlerError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

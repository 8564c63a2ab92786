//! JWKS fetching and caching

use crate::AuthError;
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Minimum spacing between two refresh attempts
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Source of the JSON Web Key Set
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, AuthError>;
}

/// Fetches the key set from a JWKS endpoint over HTTP
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    url: String,
    client: reqwest::Client,
}

impl HttpKeySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::JwksFetch(format!("failed to create http client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::JwksFetch(format!("{}: {e}", self.url)))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::JwksFetch(format!("invalid jwks from {}: {e}", self.url)))
    }
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
    last_attempt: Option<Instant>,
}

enum Refresh {
    Done,
    Skipped,
    Failed(AuthError),
}

/// Cached key set with periodic and on-demand refresh
///
/// Keys older than the refresh interval are refetched on the next lookup;
/// a failed refresh keeps serving the previous keys. An unknown `kid`
/// triggers a refetch, at most once per [`MIN_REFRESH_INTERVAL`].
pub struct JwksCache {
    source: Arc<dyn KeySource>,
    refresh_interval: Duration,
    state: RwLock<CachedKeys>,
    refreshing: Mutex<()>,
}

impl JwksCache {
    /// Fetch the key set once and build the cache
    pub async fn new(
        source: Arc<dyn KeySource>,
        refresh_interval: Duration,
    ) -> Result<Self, AuthError> {
        let keys = source.fetch().await?;
        info!(keys = keys.keys.len(), "JWKS loaded");

        Ok(Self {
            source,
            refresh_interval,
            state: RwLock::new(CachedKeys {
                keys,
                fetched_at: Instant::now(),
                last_attempt: None,
            }),
            refreshing: Mutex::new(()),
        })
    }

    /// Look up the key with id `kid`
    pub async fn get(&self, kid: &str) -> Result<Jwk, AuthError> {
        if self.is_stale().await {
            // Errors are logged and the cached keys stay in use
            self.refresh(false).await;
        }

        if let Some(jwk) = self.find(kid).await {
            return Ok(jwk);
        }

        debug!(kid = %kid, "Unknown kid, refreshing JWKS");
        let outcome = self.refresh(true).await;

        match (self.find(kid).await, outcome) {
            (Some(jwk), _) => Ok(jwk),
            (None, Refresh::Failed(e)) => Err(e),
            (None, _) => Err(AuthError::KeyNotFound(kid.to_string())),
        }
    }

    /// Number of cached keys
    pub async fn len(&self) -> usize {
        self.state.read().await.keys.keys.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn find(&self, kid: &str) -> Option<Jwk> {
        self.state.read().await.keys.find(kid).cloned()
    }

    async fn is_stale(&self) -> bool {
        self.state.read().await.fetched_at.elapsed() >= self.refresh_interval
    }

    async fn refresh(&self, unknown_kid: bool) -> Refresh {
        let _guard = self.refreshing.lock().await;

        {
            let state = self.state.read().await;
            let throttled = state
                .last_attempt
                .is_some_and(|at| at.elapsed() < MIN_REFRESH_INTERVAL);
            // Another caller refreshed while we waited for the lock
            let fresh = !unknown_kid && state.fetched_at.elapsed() < self.refresh_interval;
            if throttled || fresh {
                return Refresh::Skipped;
            }
        }

        self.state.write().await.last_attempt = Some(Instant::now());

        match self.source.fetch().await {
            Ok(keys) => {
                debug!(keys = keys.keys.len(), "JWKS refreshed");
                let mut state = self.state.write().await;
                state.keys = keys;
                state.fetched_at = Instant::now();
                Refresh::Done
            }
            Err(e) => {
                warn!(error = %e, "JWKS refresh failed, keeping cached keys");
                Refresh::Failed(e)
            }
        }
    }
}

use crate::AuthError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where identity fields live in the JWT payload
///
/// Paths are dot-separated, e.g. `realm_access.roles`. An empty path leaves
/// the field unset, except `user_id` which falls back to `sub`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimsMapping {
    pub user_id: String,
    pub tenant_id: String,
    pub roles: String,
    pub permissions: String,
}

impl Default for ClaimsMapping {
    fn default() -> Self {
        Self {
            user_id: "sub".to_string(),
            tenant_id: String::new(),
            roles: String::new(),
            permissions: String::new(),
        }
    }
}

impl ClaimsMapping {
    pub(crate) fn normalized(mut self) -> Self {
        if self.user_id.is_empty() {
            self.user_id = "sub".to_string();
        }
        self
    }
}

/// JWT authentication configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWKS endpoint, e.g. `https://idp.example.com/.well-known/jwks.json`
    pub jwks_url: String,
    /// Expected `iss` claim
    pub issuer: String,
    /// Expected `aud` claim
    pub audience: String,
    pub claims_mapping: ClaimsMapping,
    /// Timeout of a single JWKS request
    pub http_timeout_secs: u64,
    /// Clock skew tolerated for `exp` and `nbf`
    pub leeway_secs: u64,
    /// Age after which cached keys are refetched
    pub refresh_interval_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwks_url: String::new(),
            issuer: String::new(),
            audience: String::new(),
            claims_mapping: ClaimsMapping::default(),
            http_timeout_secs: 10,
            leeway_secs: 60,
            refresh_interval_secs: 900,
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwks_url.is_empty() {
            return Err(AuthError::JwksUrlRequired);
        }
        if self.issuer.is_empty() {
            return Err(AuthError::IssuerRequired);
        }
        if self.audience.is_empty() {
            return Err(AuthError::AudienceRequired);
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

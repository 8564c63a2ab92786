use crate::claims::extract_claims;
use crate::jwks::{HttpKeySource, JwksCache, KeySource};
use crate::{AuthConfig, AuthError, ClaimsMapping};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use request_context::Claims;
use serde_json::{Map, Value};
use std::sync::Arc;
use telemetry::with_span;
use tracing::debug;

const RSA_FAMILY: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];
const HMAC_FAMILY: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Validates bearer tokens against a JWKS and maps their claims
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_jwt_auth::{AuthConfig, Authenticator};
///
/// # async fn example() -> Result<(), grpc_jwt_auth::AuthError> {
/// let auth = Authenticator::new(AuthConfig {
///     jwks_url: "https://idp.example.com/.well-known/jwks.json".to_string(),
///     issuer: "https://idp.example.com".to_string(),
///     audience: "orders".to_string(),
///     ..Default::default()
/// })
/// .await?;
///
/// let claims = auth.authenticate("eyJhbGciOi...").await?;
/// println!("caller: {}", claims.user_id);
/// # Ok(())
/// # }
/// ```
pub struct Authenticator {
    keys: JwksCache,
    issuer: String,
    audience: String,
    mapping: ClaimsMapping,
    leeway_secs: u64,
}

impl Authenticator {
    /// Create an authenticator fetching keys from `config.jwks_url`
    ///
    /// The key set is fetched once up front; failure yields
    /// [`AuthError::JwksFetch`].
    pub async fn new(config: AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;
        let source = HttpKeySource::new(config.jwks_url.clone(), config.http_timeout())?;
        Self::with_key_source(config, Arc::new(source)).await
    }

    /// Create an authenticator over any [`KeySource`]
    pub async fn with_key_source(
        config: AuthConfig,
        source: Arc<dyn KeySource>,
    ) -> Result<Self, AuthError> {
        config.validate()?;
        let keys = JwksCache::new(source, config.refresh_interval()).await?;

        Ok(Self {
            keys,
            issuer: config.issuer,
            audience: config.audience,
            mapping: config.claims_mapping.normalized(),
            leeway_secs: config.leeway_secs,
        })
    }

    /// Verify `token` (without the `Bearer ` prefix) and extract its claims
    pub async fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let header = decode_header(token).map_err(|e| AuthError::MalformedToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::MalformedToken("token header has no kid".to_string()))?;

        let jwk = with_span("jwtauth.lookup_jwks", self.keys.get(&kid)).await?;

        let payload = with_span("jwtauth.parse_token", async {
            self.verify(token, header.alg, &jwk)
        })
        .await?;

        let claims = extract_claims(&payload, &self.mapping);
        debug!(user_id = %claims.user_id, kid = %kid, "Token validated");
        Ok(claims)
    }

    fn verify(
        &self,
        token: &str,
        header_alg: Algorithm,
        jwk: &Jwk,
    ) -> Result<Map<String, Value>, AuthError> {
        let alg = infer_algorithm(jwk, header_alg)?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::UnsupportedAlgorithm(format!("unusable key: {e}")))?;

        let mut validation = Validation::new(alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        // `exp` and `nbf` are checked only when present
        validation.set_required_spec_claims(&["iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = self.leeway_secs;

        decode::<Map<String, Value>>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| map_jwt_error(e.into_kind()))
    }
}

/// Pick the verification algorithm for `jwk`
///
/// Uses the key's `alg` when present. Otherwise the header algorithm must
/// belong to the family implied by the key type and curve.
fn infer_algorithm(jwk: &Jwk, header_alg: Algorithm) -> Result<Algorithm, AuthError> {
    let unsupported = || AuthError::UnsupportedAlgorithm(format!("{header_alg:?}"));

    if let Some(key_alg) = &jwk.common.key_algorithm {
        let alg = signing_algorithm(key_alg).ok_or_else(unsupported)?;
        return if alg == header_alg {
            Ok(alg)
        } else {
            Err(unsupported())
        };
    }

    let family: &[Algorithm] = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => RSA_FAMILY,
        AlgorithmParameters::OctetKey(_) => HMAC_FAMILY,
        AlgorithmParameters::EllipticCurve(params) => match params.curve {
            EllipticCurve::P256 => &[Algorithm::ES256],
            EllipticCurve::P384 => &[Algorithm::ES384],
            _ => &[],
        },
        AlgorithmParameters::OctetKeyPair(params) => match params.curve {
            EllipticCurve::Ed25519 => &[Algorithm::EdDSA],
            _ => &[],
        },
    };

    if family.contains(&header_alg) {
        Ok(header_alg)
    } else {
        Err(unsupported())
    }
}

fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        // Encryption algorithms
        _ => None,
    }
}

fn map_jwt_error(kind: ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidSignature | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) => {
            AuthError::SignatureVerification
        }
        other @ (ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm) => AuthError::UnsupportedAlgorithm(format!("{other:?}")),
        ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
            "iss" => AuthError::InvalidIssuer,
            "aud" => AuthError::InvalidAudience,
            _ => AuthError::MalformedToken(format!("missing required claim {claim}")),
        },
        other => AuthError::MalformedToken(format!("{other:?}")),
    }
}

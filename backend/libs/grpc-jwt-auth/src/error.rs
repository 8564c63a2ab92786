use thiserror::Error;
use tonic::Status;

/// Authentication failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("jwks url is required")]
    JwksUrlRequired,

    #[error("issuer is required")]
    IssuerRequired,

    #[error("audience is required")]
    AudienceRequired,

    #[error("missing authorization token")]
    MissingToken,

    #[error("invalid authorization format, expected 'Bearer <token>'")]
    InvalidTokenFormat,

    #[error("token expired")]
    TokenExpired,

    #[error("token not yet valid")]
    TokenNotYetValid,

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid audience")]
    InvalidAudience,

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("no key found for kid {0}")]
    KeyNotFound(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("failed to fetch jwks: {0}")]
    JwksFetch(String),
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::JwksFetch(_) => Status::unavailable(err.to_string()),
            _ => Status::unauthenticated(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_jwks_fetch_maps_to_unavailable() {
        let status: Status = AuthError::JwksFetch("connection refused".into()).into();
        assert_eq!(status.code(), Code::Unavailable);
        assert!(status.message().contains("connection refused"));
    }

    #[test]
    fn test_validation_errors_map_to_unauthenticated() {
        for err in [
            AuthError::MissingToken,
            AuthError::InvalidTokenFormat,
            AuthError::TokenExpired,
            AuthError::TokenNotYetValid,
            AuthError::InvalidIssuer,
            AuthError::InvalidAudience,
            AuthError::SignatureVerification,
            AuthError::KeyNotFound("k1".into()),
            AuthError::MalformedToken("bad".into()),
        ] {
            let message = err.to_string();
            let status: Status = err.into();
            assert_eq!(status.code(), Code::Unauthenticated);
            assert_eq!(status.message(), message);
        }
    }
}

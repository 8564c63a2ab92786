//! Bearer token authentication

use crate::status::status_response;
use futures::future::BoxFuture;
use grpc_jwt_auth::{AuthError, Authenticator};
use http::header::AUTHORIZATION;
use http::{HeaderMap, Request, Response};
use request_context::RequestContextExt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::Status;
use tower::{Layer, Service};
use tracing::{warn, Span};

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticates `authorization: Bearer <token>` with an [`Authenticator`]
///
/// Claims of the caller are stored in the request extensions, and copied to
/// the response extensions for outer layers. Failures short-circuit with
/// `UNAUTHENTICATED`, or `UNAVAILABLE` when the key set cannot be fetched.
#[derive(Clone)]
pub struct AuthLayer {
    auth: Arc<Authenticator>,
}

impl AuthLayer {
    pub fn new(auth: Arc<Authenticator>) -> Self {
        Self { auth }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            auth: self.auth.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    auth: Arc<Authenticator>,
}

/// Token from the `authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidTokenFormat)?;

    if value.is_empty() {
        return Err(AuthError::MissingToken);
    }
    value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::InvalidTokenFormat)
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AuthService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // The ready service is the one that must handle this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let auth = self.auth.clone();

        Box::pin(async move {
            let token = match bearer_token(req.headers()) {
                Ok(token) => token.to_string(),
                Err(e) => return Ok(rejected(req.uri().path(), e)),
            };

            let claims = match auth.authenticate(&token).await {
                Ok(claims) => claims,
                Err(e) => return Ok(rejected(req.uri().path(), e)),
            };

            Span::current().record("user_id", claims.user_id.as_str());
            req.set_claims(claims.clone());

            let mut response = inner.call(req).await?;
            response.extensions_mut().set_claims(claims);
            Ok(response)
        })
    }
}

fn rejected<B: Default>(procedure: &str, err: AuthError) -> Response<B> {
    warn!(procedure = %procedure, error = %err, "Authentication failed");
    status_response(Status::from(err))
}

//! Default interceptor chain

use crate::{
    AuthLayer, ChainError, DeadlineConfig, DeadlineLayer, ErrorMappingLayer, LoggingLayer,
    RecoveryLayer, RequestIdConfig, RequestIdLayer, TraceLayer,
};
use grpc_jwt_auth::Authenticator;
use std::sync::Arc;
use tower::layer::util::{Identity, Stack};
use tower::util::Either;
use tower::{Layer, ServiceBuilder};

type Layers = Stack<
    ErrorMappingLayer,
    Stack<
        Either<AuthLayer, Identity>,
        Stack<
            LoggingLayer,
            Stack<TraceLayer, Stack<RequestIdLayer, Stack<DeadlineLayer, Stack<RecoveryLayer, Identity>>>>,
        >,
    >,
>;

/// Builder for the standard server middleware stack
///
/// Layers run outermost first: recovery, deadline, request ID, trace,
/// logging, auth (when configured), error mapping.
///
/// ```rust,no_run
/// use grpc_interceptors::{DeadlineConfig, InterceptorChain};
///
/// # fn example() -> Result<(), grpc_interceptors::ChainError> {
/// let layer = InterceptorChain::new()
///     .with_deadline(DeadlineConfig {
///         default_timeout_secs: 10,
///         max_timeout_secs: 60,
///     })
///     .build()?;
///
/// // tonic::transport::Server::builder().layer(layer).add_service(...)
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InterceptorChain {
    deadline: DeadlineConfig,
    request_id: RequestIdConfig,
    auth: Option<Arc<Authenticator>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, config: DeadlineConfig) -> Self {
        self.deadline = config;
        self
    }

    pub fn with_request_id(mut self, config: RequestIdConfig) -> Self {
        self.request_id = config;
        self
    }

    pub fn with_auth(mut self, auth: Arc<Authenticator>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn build(self) -> Result<DefaultLayer, ChainError> {
        let layers = ServiceBuilder::new()
            .layer(RecoveryLayer::new())
            .layer(DeadlineLayer::new(&self.deadline)?)
            .layer(RequestIdLayer::new(&self.request_id)?)
            .layer(TraceLayer::new())
            .layer(LoggingLayer::new())
            .option_layer(self.auth.map(AuthLayer::new))
            .layer(ErrorMappingLayer::new())
            .into_inner();

        Ok(DefaultLayer { layers })
    }
}

/// The composed middleware stack, usable with `Server::layer`
#[derive(Clone)]
pub struct DefaultLayer {
    layers: Layers,
}

impl<S> Layer<S> for DefaultLayer
where
    Layers: Layer<S>,
{
    type Service = <Layers as Layer<S>>::Service;

    fn layer(&self, inner: S) -> Self::Service {
        self.layers.layer(inner)
    }
}

/// Chain with default configuration and no authentication
pub fn build_default() -> Result<DefaultLayer, ChainError> {
    InterceptorChain::new().build()
}

/// Chain with default configuration and bearer authentication
pub fn build_default_with_auth(auth: Arc<Authenticator>) -> Result<DefaultLayer, ChainError> {
    InterceptorChain::new().with_auth(auth).build()
}

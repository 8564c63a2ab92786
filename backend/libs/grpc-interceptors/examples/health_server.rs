//! gRPC health service behind the default interceptor chain
//!
//! ```text
//! cargo run -p grpc-interceptors --example health_server
//! grpcurl -plaintext localhost:50051 grpc.health.v1.Health/Check
//! ```

use grpc_health::{health_check_fn, HealthAggregator, HealthConfig};
use shutdown::Shutdown;
use telemetry::TelemetryConfig;
use tonic::transport::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let shutdown = Shutdown::new();
    telemetry::init(&TelemetryConfig::default(), &shutdown)?;

    let (health, health_service) = HealthAggregator::new(HealthConfig::default()).await;
    health.register("process", health_check_fn(|| async { Ok(()) }))?;
    let monitor = health.spawn(shutdown.token());

    let addr = "0.0.0.0:50051".parse()?;
    let token = shutdown.token();
    let server = Server::builder()
        .layer(grpc_interceptors::build_default()?)
        .add_service(health_service)
        .serve_with_shutdown(addr, async move { token.cancelled().await });

    tracing::info!(%addr, "Health server listening");
    let server = tokio::spawn(server);

    shutdown.wait_for_signal().await?;
    server.await??;
    monitor.await?;
    Ok(())
}

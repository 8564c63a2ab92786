//! Basic usage example of grpc-health library
//!
//! Serves `grpc.health.v1.Health` backed by an aggregator with one check
//! that flips between healthy and unhealthy every few seconds.
//!
//! To run this example:
//! ```bash
//! cargo run --example basic_usage
//!
//! # In another terminal, test the health endpoint
//! grpcurl -plaintext localhost:50051 grpc.health.v1.Health/Check
//! ```

use grpc_health::{health_check_fn, HealthAggregator, HealthCheckError, HealthConfig};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let grpc_port = std::env::var("GRPC_PORT")
        .unwrap_or_else(|_| "50051".to_string())
        .parse::<u16>()?;

    let (aggregator, health_service) = HealthAggregator::new(HealthConfig {
        interval_secs: 2,
        timeout_secs: 1,
    })
    .await;

    let started = Instant::now();
    aggregator.register(
        "flapping",
        health_check_fn(move || {
            let healthy = (started.elapsed().as_secs() / 5) % 2 == 0;
            async move {
                if healthy {
                    Ok(())
                } else {
                    Err(HealthCheckError::unavailable("simulated outage"))
                }
            }
        }),
    )?;

    let token = CancellationToken::new();
    let monitor = aggregator.spawn(token.clone());

    let addr = format!("0.0.0.0:{}", grpc_port).parse()?;
    tracing::info!(%addr, "Serving grpc.health.v1.Health");

    Server::builder()
        .add_service(health_service)
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    token.cancel();
    monitor.await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    Ok(())
}

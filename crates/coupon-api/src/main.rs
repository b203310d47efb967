//! Coupon admission service
//!
//! ```bash
//! coupon-api --config coupon.toml
//! COUPON__ADMISSION__QUOTA=500 coupon-api --bind 127.0.0.1:9000
//! ```

use clap::Parser;
use coupon_api::{build_router, start, AppConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coupon-api")]
#[command(version)]
#[command(about = "Coupon admission HTTP service", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(long, short, env = "COUPON_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides server.bind_addr
    #[arg(long, env = "COUPON_BIND_ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }

    // reset runs inside start, before the listener exists
    let service = start(&config).await?;
    let app = build_router(service.state.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(
        addr = %config.server.bind_addr,
        quota = config.admission.quota,
        "coupon api listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // last engine handle goes here; the consumer drains what is queued and exits
    drop(service.state);
    let summary = service.consumer.await?;
    tracing::info!(?summary, "grant consumer stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

//! Coupon Admission API
//!
//! HTTP transport for the admission engine plus the process wiring: grant
//! queue, persistence consumer and bootstrap reset.
//!
//! # Endpoints
//!
//! | Method | Path                          | Description                 |
//! |--------|-------------------------------|-----------------------------|
//! | POST   | `/coupon/apply?userId=<id>`   | Apply for a coupon          |
//! | GET    | `/coupon/stats`               | Outcome and storage totals  |
//! | GET    | `/health`                     | Liveness                    |

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod models;
pub mod routes;

use axum::{routing::get, Router};
use coupon_core::{
    grant_channel, AdmissionEngine, ConsumerSummary, CouponRepository, DeadLetters, GrantConsumer,
    InMemoryCouponRepository, RetryingPublisher,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
pub use error::StartupError;

/// Shared handler state
pub struct ApiState {
    /// Admission engine
    pub engine: AdmissionEngine,
    /// Coupons written by the consumer
    pub coupons: Arc<dyn CouponRepository>,
    /// Events the consumer gave up on
    pub dead_letters: DeadLetters,
}

/// A wired service: handler state plus the running grant consumer
pub struct Service {
    /// Handler state
    pub state: Arc<ApiState>,
    /// Consumer task; resolves once every publisher is dropped
    pub consumer: JoinHandle<ConsumerSummary>,
}

/// Wire the grant queue, consumer and engine, resetting the event state first
pub async fn start(config: &AppConfig) -> Result<Service, StartupError> {
    let (publisher, rx) = grant_channel(
        config.publisher.queue_capacity,
        config.publisher.enqueue_timeout(),
    );
    let publisher = RetryingPublisher::new(publisher, config.publisher.retry.to_policy());

    let coupons: Arc<dyn CouponRepository> = Arc::new(InMemoryCouponRepository::new());
    let consumer = GrantConsumer::new(rx, coupons.clone(), config.consumer.to_policy());
    let dead_letters = consumer.dead_letters();

    let engine = AdmissionEngine::builder(config.admission.to_admission_config())
        .in_memory_stores()
        .publisher(Arc::new(publisher))
        .bootstrap()
        .await?;

    let consumer = tokio::spawn(consumer.run());

    Ok(Service {
        state: Arc::new(ApiState {
            engine,
            coupons,
            dead_letters,
        }),
        consumer,
    })
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/coupon", routes::coupon::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

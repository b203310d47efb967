//! Coupon admission endpoints
//!
//! Maps engine outcomes onto HTTP statuses:
//!
//! | Outcome            | Status |
//! |--------------------|--------|
//! | `Granted`          | 200    |
//! | `DuplicateRequest` | 409    |
//! | `QuotaExhausted`   | 422    |
//! | `TransientFailure` | 503    |
//!
//! The decision runs detached from the request, so a client hanging up
//! mid-sequence cannot leave a requester half-admitted.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use coupon_core::{CouponRepository, Outcome};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{ApiResponse, GrantResponse, StatsResponse};
use crate::ApiState;

/// Routes mounted under `/coupon`
pub fn router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/apply", post(apply))
        .route("/stats", get(stats))
}

/// Query string of `POST /coupon/apply`
#[derive(Debug, Deserialize)]
pub struct ApplyParams {
    /// Requester identity
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Apply for a coupon
pub async fn apply(
    State(state): State<Arc<ApiState>>,
    params: Result<Query<ApplyParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            return error(StatusCode::BAD_REQUEST, "invalid_request", &rejection.body_text());
        }
    };
    tracing::info!(user_id = %params.user_id, "received coupon apply request");

    let user_id = params.user_id.trim();
    if user_id.is_empty() {
        return error(StatusCode::BAD_REQUEST, "invalid_request", "userId must not be empty");
    }

    let outcome = match state.engine.apply_detached(user_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(user_id, error = %e, "admission task failed");
            return error(
                StatusCode::SERVICE_UNAVAILABLE,
                "internal_error",
                "admission did not complete, retry later",
            );
        }
    };

    match outcome {
        Outcome::Granted(event) => {
            (StatusCode::OK, Json(ApiResponse::success(GrantResponse::from(&event)))).into_response()
        }
        Outcome::DuplicateRequest => error(
            StatusCode::CONFLICT,
            "duplicate_request",
            "a coupon was already applied for by this user",
        ),
        Outcome::QuotaExhausted => error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "quota_exhausted",
            "all coupons have been issued",
        ),
        Outcome::TransientFailure(stage) => error(
            StatusCode::SERVICE_UNAVAILABLE,
            "transient_failure",
            &format!("{stage} step failed, retry later"),
        ),
    }
}

/// Admission and persistence totals
pub async fn stats(State(state): State<Arc<ApiState>>) -> Response {
    let persisted = match state.coupons.count().await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(error = %e, "coupon count unavailable");
            return error(StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", &e.to_string());
        }
    };

    Json(ApiResponse::success(StatsResponse {
        quota: state.engine.config().quota,
        admission: state.engine.stats(),
        persisted,
        dead_lettered: state.dead_letters.len(),
    }))
    .into_response()
}

fn error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message))).into_response()
}

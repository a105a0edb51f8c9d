use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use freshcut_order::models::Fulfillment;
use freshcut_order::{FulfillmentError, Order};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/orders/undispatched", get(list_undispatched))
        .route("/v1/admin/orders/{id}/dispatch", post(dispatch_order))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

#[derive(Debug, Deserialize)]
pub struct UndispatchedQuery {
    pub limit: Option<i64>,
    /// Only orders at least this old; defaults to all
    pub min_age_seconds: Option<i64>,
}

fn dispatch_outcome(result: &Result<Fulfillment, FulfillmentError>) -> &'static str {
    match result {
        Ok(_) => "dispatched",
        Err(FulfillmentError::NotFound(_)) => "not_found",
        Err(FulfillmentError::AlreadyDispatched(_)) => "already_dispatched",
        Err(FulfillmentError::InProgress(_)) => "in_progress",
        Err(FulfillmentError::NotDispatchable { .. }) => "not_dispatchable",
        Err(FulfillmentError::CarrierUnavailable) => "carrier_unavailable",
        Err(FulfillmentError::CircuitOpen) => "circuit_open",
        Err(FulfillmentError::Carrier(_)) => "carrier_error",
        Err(FulfillmentError::Persistence(_)) => "failed",
    }
}

/// POST /v1/admin/orders/{id}/dispatch
///
/// Synchronous retry of the carrier hand-off, for orders whose inline dispatch failed.
pub async fn dispatch_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Fulfillment>, AppError> {
    let result = state.fulfillment.dispatch(order_id).await;
    let outcome = dispatch_outcome(&result);
    state.metrics.record_manual_dispatch(outcome);
    tracing::info!("Manual dispatch of order {}: {}", order_id, outcome);

    Ok(Json(result?))
}

/// GET /v1/admin/orders/undispatched
pub async fn list_undispatched(
    State(state): State<AppState>,
    Query(query): Query<UndispatchedQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let min_age = query.min_age_seconds.unwrap_or(0).max(0);

    let orders = state.orders.list_undispatched(min_age, limit).await?;
    Ok(Json(orders))
}

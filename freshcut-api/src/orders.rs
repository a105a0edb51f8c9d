use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use freshcut_order::{CheckoutError, CheckoutIdentity, CheckoutRequest, Order, PlacedOrder};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{checkout_identity_middleware, session_auth_middleware, SessionClaims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let checkout = Router::new()
        .route("/v1/orders", post(create_order))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), checkout_identity_middleware));

    let lookup = Router::new()
        .route("/v1/orders/{id}", get(get_order))
        .route_layer(axum::middleware::from_fn_with_state(state, session_auth_middleware));

    Router::new()
        .merge(checkout)
        .merge(lookup)
}

fn checkout_outcome(err: &CheckoutError) -> &'static str {
    if err.is_client_error() { "rejected" } else { "failed" }
}

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<CheckoutIdentity>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlacedOrder>), AppError> {
    let Json(request) = payload.map_err(|rejection| {
        state.metrics.record_checkout("rejected");
        AppError::ValidationError(rejection.body_text())
    })?;

    match state.checkout.checkout(&request, identity).await {
        Ok(placed) => {
            state.metrics.record_checkout("created");
            Ok((StatusCode::CREATED, Json(placed)))
        }
        Err(e) => {
            state.metrics.record_checkout(checkout_outcome(&e));
            Err(e.into())
        }
    }
}

/// GET /v1/orders/{id}
///
/// The order carries the shipping address, so only its customer or an admin may read it.
pub async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.get_order(order_id).await?
        .ok_or_else(|| AppError::NotFoundError(format!("Order {} not found", order_id)))?;

    if !claims.is_admin() && claims.customer_id() != Some(order.customer_id) {
        return Err(AppError::AuthorizationError("Order belongs to another customer".to_string()));
    }

    Ok(Json(order))
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use freshcut_core::StoreError;
use freshcut_order::{CheckoutError, FulfillmentError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("authentication failed: {0}")]
    AuthenticationError(String),
    #[error("forbidden: {0}")]
    AuthorizationError(String),
    #[error("invalid request: {0}")]
    ValidationError(String),
    #[error("not found: {0}")]
    NotFoundError(String),
    #[error("conflict: {0}")]
    ConflictError(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("upstream error: {0}")]
    BadGateway(String),
    /// Server-side checkout failure; the message is already safe to show
    #[error("checkout failed: {0}")]
    CheckoutFailed(String),
    #[error("internal error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::CheckoutFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::UnknownCustomer => AppError::AuthenticationError(err.public_message()),
            e if e.is_client_error() => AppError::ValidationError(e.public_message()),
            // Full detail was logged where it happened
            e => AppError::CheckoutFailed(e.public_message()),
        }
    }
}

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            FulfillmentError::AlreadyDispatched(_)
            | FulfillmentError::InProgress(_)
            | FulfillmentError::NotDispatchable { .. } => {
                AppError::ConflictError(err.to_string())
            }
            FulfillmentError::CarrierUnavailable | FulfillmentError::CircuitOpen => {
                AppError::ServiceUnavailable(err.to_string())
            }
            FulfillmentError::Carrier(e) => AppError::BadGateway(e.to_string()),
            FulfillmentError::Persistence(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFoundError(format!("Not found: {}", what)),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use freshcut_order::CheckoutIdentity;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Claims carried by session tokens. `sub` is the customer id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl SessionClaims {
    pub fn customer_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

fn bearer_token(req: &Request) -> Option<Result<&str, AppError>> {
    let header = req.headers().get(axum::http::header::AUTHORIZATION)?;
    Some(
        header.to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::AuthenticationError("Malformed Authorization header".to_string())),
    )
}

fn verify(secret: &str, token: &str) -> Result<SessionClaims, AppError> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))
}

/// Binds the checkout identity. No Authorization header means a guest checkout; a
/// header that does not verify is rejected rather than downgraded to guest.
pub async fn checkout_identity_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = match bearer_token(&req) {
        None => CheckoutIdentity::Guest,
        Some(token) => {
            let claims = verify(&state.auth.secret, token?)?;
            let customer_id = claims.customer_id()
                .ok_or_else(|| AppError::AuthenticationError("Invalid token subject".to_string()))?;
            CheckoutIdentity::Session(customer_id)
        }
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn require_claims(state: &AppState, req: &Request) -> Result<SessionClaims, AppError> {
    let token = bearer_token(req)
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))??;
    verify(&state.auth.secret, token)
}

/// Any valid session. Handlers read the claims from the request extensions.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = require_claims(&state, &req)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = require_claims(&state, &req)?;
    if !claims.is_admin() {
        return Err(AppError::AuthorizationError("Admin role required".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub mod auth;

pub use auth::{admin_auth_middleware, checkout_identity_middleware, session_auth_middleware, SessionClaims};

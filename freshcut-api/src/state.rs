use std::sync::Arc;
use freshcut_order::{CheckoutService, FulfillmentDispatcher, OrderRepository};
use freshcut_store::RedisClient;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<dyn OrderRepository>,
    pub fulfillment: Arc<FulfillmentDispatcher>,
    /// Rate limiting is skipped when absent
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit_per_minute: i64,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
}

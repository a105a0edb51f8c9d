use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Rate limiting is off without it
    pub redis: Option<RedisConfig>,
    /// Order events are only logged without it
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub carrier: CarrierConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
    #[serde(default)]
    pub fulfillment: FulfillmentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 { 120 }

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_order_topic")]
    pub order_topic: String,
}

fn default_order_topic() -> String { "order.created".to_string() }

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CarrierConfig {
    pub name: String,
    pub base_url: String,
    /// Empty credentials leave the carrier unconfigured; dispatch is skipped
    pub email: String,
    pub password: String,
    pub timeout_seconds: u64,
    pub token_ttl_hours: u64,
    pub pickup_location: String,
    pub package_length_cm: Decimal,
    pub package_breadth_cm: Decimal,
    pub package_height_cm: Decimal,
    pub package_weight_kg: Decimal,
    pub breaker_failure_threshold: usize,
    pub breaker_reset_seconds: u64,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            name: "shiprocket".to_string(),
            base_url: "https://apiv2.shiprocket.in/v1/external".to_string(),
            email: String::new(),
            password: String::new(),
            timeout_seconds: 15,
            token_ttl_hours: 216,
            pickup_location: "Primary".to_string(),
            package_length_cm: Decimal::from(20),
            package_breadth_cm: Decimal::from(15),
            package_height_cm: Decimal::from(10),
            package_weight_kg: Decimal::ONE,
            breaker_failure_threshold: 5,
            breaker_reset_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CheckoutConfig {
    pub order_number_prefix: String,
    /// Hand new orders to the carrier right after commit
    pub auto_dispatch: bool,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            order_number_prefix: "FC".to_string(),
            auto_dispatch: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FulfillmentConfig {
    /// 0 disables the sweeper
    pub sweep_interval_seconds: u64,
    pub sweep_batch_size: i64,
    pub sweep_grace_seconds: u64,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 300,
            sweep_batch_size: 20,
            sweep_grace_seconds: 120,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // FRESHCUT__CARRIER__PASSWORD=... sets carrier.password
            .add_source(config::Environment::with_prefix("FRESHCUT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

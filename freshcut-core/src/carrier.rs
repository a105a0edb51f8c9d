use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session token issued by the carrier's login endpoint
#[derive(Debug, Clone)]
pub struct CarrierToken {
    pub value: String,
    /// `None` when the carrier does not advertise an expiry; the session applies its own TTL.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ShipmentPaymentMode {
    #[serde(rename = "COD")]
    Cod,
    Prepaid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consignee {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub landmark: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub pincode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub sku: String,
    pub name: String,
    pub units: i32,
    pub selling_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageDimensions {
    pub length_cm: Decimal,
    pub breadth_cm: Decimal,
    pub height_cm: Decimal,
    pub weight_kg: Decimal,
}

/// Everything the carrier needs to book a pickup for one order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub order_reference: String,
    pub order_date: DateTime<Utc>,
    pub pickup_location: String,
    pub consignee: Consignee,
    pub items: Vec<ShipmentLine>,
    pub payment_mode: ShipmentPaymentMode,
    pub sub_total: Decimal,
    pub package: PackageDimensions,
}

/// Carrier's acknowledgement of a booked shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentReceipt {
    pub awb_number: String,
    pub carrier_name: String,
    pub label_url: Option<String>,
    pub tracking_payload: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("Carrier credentials are not configured")]
    NotConfigured,

    #[error("Carrier rejected the session token")]
    Unauthorized,

    #[error("Carrier rejected the shipment: {0}")]
    Rejected(String),

    #[error("Carrier transport error: {0}")]
    Transport(String),

    #[error("Carrier call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected carrier response: {0}")]
    InvalidResponse(String),
}

impl CarrierError {
    /// Whether the failure says something about the carrier's health (and should count
    /// against the circuit breaker) rather than about our own setup or the request.
    pub fn is_outage(&self) -> bool {
        matches!(
            self,
            CarrierError::Transport(_) | CarrierError::Timeout(_) | CarrierError::InvalidResponse(_)
        )
    }
}

#[async_trait]
pub trait CarrierClient: Send + Sync {
    /// Display name stored on fulfillment records
    fn name(&self) -> &str;

    /// Absence of credentials is a valid state: dispatch is skipped, not failed loudly.
    fn is_configured(&self) -> bool;

    /// Exchange configured credentials for a session token
    async fn login(&self) -> Result<CarrierToken, CarrierError>;

    /// Book a shipment
    async fn create_shipment(
        &self,
        token: &str,
        request: &ShipmentRequest,
    ) -> Result<ShipmentReceipt, CarrierError>;
}

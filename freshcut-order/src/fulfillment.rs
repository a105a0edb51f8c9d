use chrono::{DateTime, Utc};
use freshcut_core::carrier::{
    CarrierClient, CarrierError, Consignee, PackageDimensions, ShipmentLine, ShipmentPaymentMode,
    ShipmentReceipt, ShipmentRequest,
};
use freshcut_core::StoreError;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{Fulfillment, NewFulfillment, Order, OrderStatus, PaymentMethod};
use crate::repository::OrderRepository;
use crate::resiliency::CircuitBreaker;

/// Slack on top of the carrier timeout before an abandoned dispatch claim can be retaken
const CLAIM_GRACE: Duration = Duration::from_secs(30);

/// Knobs for carrier hand-off
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Upper bound on one carrier call, re-login included
    pub timeout: Duration,
    /// Local lifetime of a carrier session token
    pub token_ttl: Duration,
    pub pickup_location: String,
    pub package: PackageDimensions,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            token_ttl: Duration::from_secs(216 * 3600),
            pickup_location: "Primary".to_string(),
            package: PackageDimensions {
                length_cm: Decimal::from(20),
                breadth_cm: Decimal::from(15),
                height_cm: Decimal::from(10),
                weight_kg: Decimal::ONE,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Carrier client plus its login token.
///
/// One session is shared by every dispatch in the process. The token is fetched lazily,
/// kept until it expires, and replaced once when the carrier says it is no longer valid.
pub struct CarrierSession {
    client: Arc<dyn CarrierClient>,
    token_ttl: chrono::Duration,
    token: RwLock<Option<CachedToken>>,
}

impl CarrierSession {
    pub fn new(client: Arc<dyn CarrierClient>, token_ttl: Duration) -> Self {
        let token_ttl = chrono::Duration::from_std(token_ttl).unwrap_or_else(|_| chrono::Duration::hours(216));
        Self {
            client,
            token_ttl,
            token: RwLock::new(None),
        }
    }

    pub fn carrier_name(&self) -> &str {
        self.client.name()
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn token(&self) -> Result<String, CarrierError> {
        let now = Utc::now();
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > now {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another task may have logged in while we waited for the lock
        if let Some(cached) = slot.as_ref() {
            if cached.expires_at > now {
                return Ok(cached.value.clone());
            }
        }

        let token = self.client.login().await?;
        let local_expiry = now + self.token_ttl;
        let expires_at = token.expires_at.map_or(local_expiry, |at| at.min(local_expiry));
        tracing::debug!("Logged in to carrier {}, token valid until {}", self.client.name(), expires_at);

        *slot = Some(CachedToken { value: token.value.clone(), expires_at });
        Ok(token.value)
    }

    /// Drop the cached token, unless someone already replaced it
    async fn invalidate(&self, stale: &str) {
        let mut slot = self.token.write().await;
        if slot.as_ref().is_some_and(|cached| cached.value == stale) {
            *slot = None;
        }
    }

    pub async fn create_shipment(&self, request: &ShipmentRequest) -> Result<ShipmentReceipt, CarrierError> {
        let token = self.token().await?;
        match self.client.create_shipment(&token, request).await {
            Err(CarrierError::Unauthorized) => {
                tracing::warn!("Carrier {} rejected cached token, logging in again", self.client.name());
                self.invalidate(&token).await;
                let token = self.token().await?;
                self.client.create_shipment(&token, request).await
            }
            other => other,
        }
    }
}

/// Hands committed orders to the carrier. Never called inside the order transaction.
pub struct FulfillmentDispatcher {
    orders: Arc<dyn OrderRepository>,
    session: CarrierSession,
    breaker: CircuitBreaker,
    settings: DispatchSettings,
}

impl FulfillmentDispatcher {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        carrier: Arc<dyn CarrierClient>,
        breaker: CircuitBreaker,
        settings: DispatchSettings,
    ) -> Self {
        let session = CarrierSession::new(carrier, settings.token_ttl);
        Self { orders, session, breaker, settings }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn dispatch(&self, order_id: Uuid) -> Result<Fulfillment, FulfillmentError> {
        let order = self.orders.get_order(order_id).await
            .map_err(|e| FulfillmentError::Persistence(e.to_string()))?
            .ok_or(FulfillmentError::NotFound(order_id))?;

        if order.fulfillment.is_some() {
            return Err(FulfillmentError::AlreadyDispatched(order_id));
        }
        if !order.status.is_dispatchable() {
            return Err(FulfillmentError::NotDispatchable { order_id, status: order.status });
        }
        if !self.session.is_configured() {
            return Err(FulfillmentError::CarrierUnavailable);
        }

        let claimed = self.orders.claim_dispatch(order_id, self.settings.timeout + CLAIM_GRACE).await
            .map_err(|e| FulfillmentError::Persistence(e.to_string()))?;
        if !claimed {
            return Err(FulfillmentError::InProgress(order_id));
        }
        if !self.breaker.check().await {
            self.release_claim(order_id).await;
            return Err(FulfillmentError::CircuitOpen);
        }

        let request = self.build_request(&order);
        let outcome = match tokio::time::timeout(self.settings.timeout, self.session.create_shipment(&request)).await {
            Ok(result) => result,
            Err(_) => Err(CarrierError::Timeout(self.settings.timeout)),
        };

        let receipt = match outcome {
            Ok(receipt) => {
                self.breaker.record_success().await;
                receipt
            }
            Err(e) => {
                if e.is_outage() {
                    self.breaker.record_failure().await;
                } else {
                    self.breaker.release_probe().await;
                }
                self.release_claim(order_id).await;
                return Err(FulfillmentError::Carrier(e));
            }
        };

        let record = NewFulfillment {
            carrier_name: receipt.carrier_name,
            awb_number: receipt.awb_number,
            label_url: receipt.label_url,
            tracking_payload: receipt.tracking_payload,
        };

        match self.orders.attach_fulfillment(order_id, &record).await {
            Ok(fulfillment) => Ok(fulfillment),
            Err(StoreError::AlreadyFulfilled(_)) => {
                // Lost a race with another dispatch after the carrier booked; the extra
                // AWB needs cancelling on the carrier side.
                tracing::error!(
                    "Order {} was dispatched concurrently; orphaned {} AWB {}",
                    order.order_number, record.carrier_name, record.awb_number
                );
                Err(FulfillmentError::AlreadyDispatched(order_id))
            }
            Err(e) => {
                // The claim stays until its lease runs out so nobody books a second AWB meanwhile
                tracing::error!(
                    "Carrier booked AWB {} for order {} but saving it failed: {}",
                    record.awb_number, order.order_number, e
                );
                Err(FulfillmentError::Persistence(e.to_string()))
            }
        }
    }

    async fn release_claim(&self, order_id: Uuid) {
        if let Err(e) = self.orders.release_dispatch(order_id).await {
            tracing::warn!("Could not release dispatch claim on order {}: {}", order_id, e);
        }
    }

    /// Run `dispatch` on its own task. Whatever happens stays inside the task.
    pub fn spawn_dispatch(self: &Arc<Self>, order_id: Uuid) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            match dispatcher.dispatch(order_id).await {
                Ok(fulfillment) => tracing::info!(
                    "Order {} dispatched via {} (AWB {})",
                    order_id, fulfillment.carrier_name, fulfillment.awb_number
                ),
                Err(FulfillmentError::CarrierUnavailable) => {
                    tracing::info!("Carrier not configured, order {} left pending", order_id)
                }
                Err(FulfillmentError::AlreadyDispatched(_)) | Err(FulfillmentError::InProgress(_)) => {
                    tracing::debug!("Order {} already dispatched or being dispatched", order_id)
                }
                Err(e) => tracing::warn!("Dispatch of order {} failed: {}", order_id, e),
            }
        })
    }

    fn build_request(&self, order: &Order) -> ShipmentRequest {
        let address = &order.shipping_address;
        let consignee = Consignee {
            name: address.recipient_name.clone(),
            phone: address.phone.clone(),
            email: address.email.clone(),
            address: address.address.clone(),
            landmark: address.landmark.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            pincode: address.pincode.clone(),
        };

        let items = order.items.iter()
            .map(|item| ShipmentLine {
                sku: item.variant_id.to_string(),
                name: match &item.cut_type {
                    Some(cut) => format!("{} {} ({})", item.product_name, item.variant_label, cut),
                    None => format!("{} {}", item.product_name, item.variant_label),
                },
                units: item.quantity,
                selling_price: item.unit_price,
            })
            .collect();

        ShipmentRequest {
            order_reference: order.order_number.clone(),
            order_date: order.created_at,
            pickup_location: self.settings.pickup_location.clone(),
            consignee,
            items,
            payment_mode: match order.payment_method {
                PaymentMethod::Cod => ShipmentPaymentMode::Cod,
                PaymentMethod::Online => ShipmentPaymentMode::Prepaid,
            },
            sub_total: order.total_amount,
            package: self.settings.package.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order {0} already has a shipment")]
    AlreadyDispatched(Uuid),

    #[error("Order {0} is being dispatched by another worker")]
    InProgress(Uuid),

    #[error("Order {order_id} is {status} and cannot be dispatched")]
    NotDispatchable { order_id: Uuid, status: OrderStatus },

    #[error("Carrier is not configured")]
    CarrierUnavailable,

    #[error("Carrier circuit is open")]
    CircuitOpen,

    #[error(transparent)]
    Carrier(#[from] CarrierError),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Only fresh orders can be handed to a carrier
    pub fn is_dispatchable(&self) -> bool {
        *self == OrderStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery
    #[default]
    Cod,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Online => "online",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomerRole {
    Customer,
    Admin,
}

impl CustomerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerRole::Customer => "customer",
            CustomerRole::Admin => "admin",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! impl_from_str {
    ($ty:ty, $kind:literal, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| ParseEnumError { kind: $kind, value: s.to_string() })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_from_str!(OrderStatus, "order status", [
    OrderStatus::Pending, OrderStatus::Processing, OrderStatus::Delivered, OrderStatus::Cancelled,
]);
impl_from_str!(PaymentStatus, "payment status", [
    PaymentStatus::Pending, PaymentStatus::Paid, PaymentStatus::Failed, PaymentStatus::Refunded,
]);
impl_from_str!(PaymentMethod, "payment method", [PaymentMethod::Cod, PaymentMethod::Online]);
impl_from_str!(CustomerRole, "customer role", [CustomerRole::Customer, CustomerRole::Admin]);

/// A shopper, keyed by their normalised phone number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub role: CustomerRole,
    pub created_at: DateTime<Utc>,
}

/// Contact details used to find or create a customer on checkout
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomer {
    pub name: String,
    /// Normalised 10-digit phone; the unique contact key
    pub phone: String,
    pub email: Option<String>,
}

/// Address copied onto the order at checkout. Later edits to the customer's saved
/// addresses never reach an existing order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub landmark: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub pincode: String,
}

/// The single source of truth for a customer's purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub shipping_address: ShippingAddress,
    pub fulfillment: Option<Fulfillment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Recompute the total from line items
    pub fn calculate_total(&self) -> Decimal {
        self.items.iter().map(|item| item.total_price).sum()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Pending and never handed to a carrier
    pub fn awaits_dispatch(&self) -> bool {
        self.status.is_dispatchable() && self.fulfillment.is_none()
    }
}

/// A write-once line of an order, priced at checkout time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub product_name: String,
    pub variant_label: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub cut_type: Option<String>,
}

/// Order header and lines as computed by the assembler, ready to insert
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub items: Vec<NewOrderItem>,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub product_name: String,
    pub variant_label: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub cut_type: Option<String>,
}

impl NewOrderItem {
    pub fn into_order_item(self, order_id: Uuid) -> OrderItem {
        OrderItem {
            id: self.id,
            order_id,
            product_id: self.product_id,
            variant_id: self.variant_id,
            product_name: self.product_name,
            variant_label: self.variant_label,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price: self.total_price,
            cut_type: self.cut_type,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    /// Carrier accepted the booking; pickup not yet confirmed
    Booked,
    InTransit,
    Delivered,
    Returned,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Booked => "booked",
            FulfillmentStatus::InTransit => "in_transit",
            FulfillmentStatus::Delivered => "delivered",
            FulfillmentStatus::Returned => "returned",
        }
    }
}

impl_from_str!(FulfillmentStatus, "fulfillment status", [
    FulfillmentStatus::Booked, FulfillmentStatus::InTransit,
    FulfillmentStatus::Delivered, FulfillmentStatus::Returned,
]);

/// Shipment booked with a carrier for an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fulfillment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub carrier_name: String,
    pub awb_number: String,
    pub label_url: Option<String>,
    pub tracking_payload: serde_json::Value,
    pub status: FulfillmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFulfillment {
    pub carrier_name: String,
    pub awb_number: String,
    pub label_url: Option<String>,
    pub tracking_payload: serde_json::Value,
}

/// What the client gets back from checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
}

impl From<&Order> for PlacedOrder {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            total_amount: order.total_amount,
            status: order.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [OrderStatus::Pending, OrderStatus::Processing, OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert_eq!("in_transit".parse::<FulfillmentStatus>().unwrap(), FulfillmentStatus::InTransit);
    }

    #[test]
    fn test_serde_names_match_storage_names() {
        assert_eq!(serde_json::to_string(&OrderStatus::Processing).unwrap(), "\"processing\"");
        assert_eq!(serde_json::to_string(&PaymentMethod::Cod).unwrap(), "\"cod\"");
        assert_eq!(PaymentMethod::default(), PaymentMethod::Cod);
    }

    #[test]
    fn test_only_pending_is_dispatchable() {
        assert!(OrderStatus::Pending.is_dispatchable());
        assert!(!OrderStatus::Processing.is_dispatchable());
        assert!(!OrderStatus::Cancelled.is_dispatchable());
    }
}

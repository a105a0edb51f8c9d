use rust_decimal::Decimal;
use uuid::Uuid;

use crate::pii::Masked;

/// Published once per committed order. Consumed by the email/SMS workers.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_phone: Masked<String>,
    pub customer_email: Option<Masked<String>>,
    pub total_amount: Decimal,
    pub item_count: usize,
    pub payment_method: String,
    pub timestamp: i64,
}

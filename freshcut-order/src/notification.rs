use async_trait::async_trait;
use freshcut_core::notification::{NotifyError, OrderNotifier};
use freshcut_shared::models::events::OrderCreatedEvent;
use freshcut_shared::Masked;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::models::{Customer, Order};

/// Build the order-created event for a freshly committed order
pub fn order_created_event(order: &Order, customer: &Customer) -> OrderCreatedEvent {
    OrderCreatedEvent {
        order_id: order.id,
        order_number: order.order_number.clone(),
        customer_id: customer.id,
        customer_name: order.shipping_address.recipient_name.clone(),
        customer_phone: Masked::new(order.shipping_address.phone.clone()),
        customer_email: order.shipping_address.email.clone().map(Masked::new),
        total_amount: order.total_amount,
        item_count: order.item_count(),
        payment_method: order.payment_method.as_str().to_string(),
        timestamp: order.created_at.timestamp(),
    }
}

/// Fans an event out to every notifier, one task each.
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn OrderNotifier>>,
}

impl NotificationDispatcher {
    pub fn new(notifiers: Vec<Arc<dyn OrderNotifier>>) -> Self {
        Self { notifiers }
    }

    pub fn channels(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.channel()).collect()
    }

    /// Returns immediately. Delivery failures are logged inside each task and go no further.
    pub fn notify_order_created(&self, event: OrderCreatedEvent) -> Vec<JoinHandle<()>> {
        let event = Arc::new(event);
        self.notifiers.iter()
            .map(|notifier| {
                let notifier = Arc::clone(notifier);
                let event = Arc::clone(&event);
                tokio::spawn(async move {
                    match notifier.notify_order_created(&event).await {
                        Ok(()) => tracing::debug!(
                            "Notified {} about order {}",
                            notifier.channel(), event.order_number
                        ),
                        Err(e) => tracing::warn!(
                            "Notification via {} for order {} failed: {}",
                            notifier.channel(), event.order_number, e
                        ),
                    }
                })
            })
            .collect()
    }
}

/// Writes order events to the log. Always installed, so every order leaves a trace
/// even with no external channel configured.
pub struct TracingNotifier;

#[async_trait]
impl OrderNotifier for TracingNotifier {
    fn channel(&self) -> &str {
        "log"
    }

    async fn notify_order_created(&self, event: &OrderCreatedEvent) -> Result<(), NotifyError> {
        tracing::info!(
            order_number = %event.order_number,
            customer_phone = %event.customer_phone,
            total = %event.total_amount,
            items = event.item_count,
            "Order created"
        );
        Ok(())
    }
}

use async_trait::async_trait;
use freshcut_shared::models::events::OrderCreatedEvent;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// A side channel told about new orders (email, SMS, event bus).
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    /// Short channel name used in logs
    fn channel(&self) -> &str;

    async fn notify_order_created(&self, event: &OrderCreatedEvent) -> Result<(), NotifyError>;
}

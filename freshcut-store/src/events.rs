use async_trait::async_trait;
use freshcut_core::notification::{NotifyError, OrderNotifier};
use freshcut_shared::models::events::OrderCreatedEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Published {} to {}: partition {} offset {}", key, topic, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to publish {} to {}: {}", key, topic, e);
                Err(e)
            }
        }
    }
}

/// Publishes order-created events for the email/SMS workers, keyed by order number
pub struct KafkaOrderNotifier {
    producer: EventProducer,
    topic: String,
}

impl KafkaOrderNotifier {
    pub fn new(producer: EventProducer, topic: impl Into<String>) -> Self {
        Self { producer, topic: topic.into() }
    }
}

#[async_trait]
impl OrderNotifier for KafkaOrderNotifier {
    fn channel(&self) -> &str {
        "kafka"
    }

    async fn notify_order_created(&self, event: &OrderCreatedEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(event).map_err(|e| NotifyError::Delivery(e.to_string()))?;
        self.producer
            .publish(&self.topic, &event.order_number, &payload)
            .await
            .map_err(|e| NotifyError::Unavailable(e.to_string()))
    }
}

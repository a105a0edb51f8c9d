use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::fulfillment::{FulfillmentDispatcher, FulfillmentError};
use crate::repository::OrderRepository;

#[derive(Debug, Clone)]
pub struct SweepSettings {
    /// Zero disables the sweeper
    pub interval: Duration,
    pub batch_size: i64,
    /// Orders younger than this are left to the inline dispatch
    pub grace_period: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            batch_size: 20,
            grace_period: Duration::from_secs(120),
        }
    }
}

/// Result of one pass over the undispatched queue
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub dispatched: usize,
    pub failed: usize,
}

/// Re-attempts carrier hand-off for pending orders that never got a shipment
pub struct DispatchSweeper {
    orders: Arc<dyn OrderRepository>,
    dispatcher: Arc<FulfillmentDispatcher>,
    settings: SweepSettings,
}

impl DispatchSweeper {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        dispatcher: Arc<FulfillmentDispatcher>,
        settings: SweepSettings,
    ) -> Self {
        Self { orders, dispatcher, settings }
    }

    pub async fn sweep_once(&self) -> SweepReport {
        let min_age = self.settings.grace_period.as_secs() as i64;
        let orders = match self.orders.list_undispatched(min_age, self.settings.batch_size).await {
            Ok(orders) => orders,
            Err(e) => {
                error!("Sweeper could not list undispatched orders: {}", e);
                return SweepReport::default();
            }
        };

        let mut report = SweepReport { examined: orders.len(), ..SweepReport::default() };
        for order in orders {
            match self.dispatcher.dispatch(order.id).await {
                Ok(fulfillment) => {
                    info!("Sweeper dispatched order {} (AWB {})", order.order_number, fulfillment.awb_number);
                    report.dispatched += 1;
                }
                Err(FulfillmentError::CarrierUnavailable) | Err(FulfillmentError::CircuitOpen) => {
                    // Nothing else in this batch will get through either
                    debug!("Carrier unavailable, sweeper stopping early");
                    report.failed += 1;
                    break;
                }
                Err(FulfillmentError::AlreadyDispatched(_)) | Err(FulfillmentError::InProgress(_)) => {}
                Err(e) => {
                    warn!("Sweeper failed to dispatch order {}: {}", order.order_number, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Loop forever. Returns immediately when the interval is zero.
    pub async fn run(self) {
        if self.settings.interval.is_zero() {
            info!("Dispatch sweeper disabled");
            return;
        }

        info!("Dispatch sweeper started, every {:?}", self.settings.interval);
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = self.sweep_once().await;
            if report.examined > 0 {
                info!(
                    "Sweep finished: {} examined, {} dispatched, {} failed",
                    report.examined, report.dispatched, report.failed
                );
            }
        }
    }
}

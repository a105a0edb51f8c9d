use std::sync::Arc;
use std::time::Duration;
use freshcut_order::{DispatchSweeper, FulfillmentDispatcher, OrderRepository, SweepSettings};
use freshcut_store::app_config::FulfillmentConfig;
use tokio::task::JoinHandle;
use tracing::info;

pub fn sweep_settings(config: &FulfillmentConfig) -> SweepSettings {
    SweepSettings {
        interval: Duration::from_secs(config.sweep_interval_seconds),
        batch_size: config.sweep_batch_size.max(1),
        grace_period: Duration::from_secs(config.sweep_grace_seconds),
    }
}

/// Spawn the background sweeper that retries carrier hand-off for stuck orders.
/// Returns `None` when the sweeper is disabled.
pub fn start_dispatch_sweeper(
    orders: Arc<dyn OrderRepository>,
    dispatcher: Arc<FulfillmentDispatcher>,
    config: &FulfillmentConfig,
) -> Option<JoinHandle<()>> {
    let settings = sweep_settings(config);
    if settings.interval.is_zero() {
        info!("Dispatch sweeper disabled by configuration");
        return None;
    }

    let sweeper = DispatchSweeper::new(orders, dispatcher, settings);
    Some(tokio::spawn(sweeper.run()))
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use freshcut_api::{app, metrics::Metrics, state::{AppState, AuthConfig}, worker};
use freshcut_catalog::{CatalogRepository, PriceResolver};
use freshcut_core::carrier::{CarrierClient, PackageDimensions};
use freshcut_core::notification::OrderNotifier;
use freshcut_order::{
    CheckoutService, CircuitBreaker, CustomerRepository, DispatchSettings, FulfillmentDispatcher,
    NotificationDispatcher, OrderAssembler, OrderNumberGenerator, OrderRepository, TracingNotifier,
};
use freshcut_store::{
    Config, DbClient, EventProducer, HttpCarrierClient, KafkaOrderNotifier, PgCatalogRepository,
    PgCustomerRepository, PgOrderRepository, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freshcut_api=debug,freshcut_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting FreshCut API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let catalog: Arc<dyn CatalogRepository> = Arc::new(PgCatalogRepository::new(db.pool.clone()));
    let customers: Arc<dyn CustomerRepository> = Arc::new(PgCustomerRepository::new(db.pool.clone()));
    let orders: Arc<dyn OrderRepository> = Arc::new(PgOrderRepository::new(db.pool.clone()));

    // Carrier
    let carrier_config = &config.carrier;
    let carrier: Arc<dyn CarrierClient> = Arc::new(
        HttpCarrierClient::new(carrier_config).context("Failed to build carrier client")?,
    );
    if !carrier.is_configured() {
        tracing::warn!("Carrier credentials missing; orders will stay pending until dispatched manually");
    }
    let fulfillment = Arc::new(FulfillmentDispatcher::new(
        orders.clone(),
        carrier,
        CircuitBreaker::new(
            carrier_config.name.as_str(),
            carrier_config.breaker_failure_threshold,
            Duration::from_secs(carrier_config.breaker_reset_seconds),
        ),
        DispatchSettings {
            timeout: Duration::from_secs(carrier_config.timeout_seconds),
            token_ttl: Duration::from_secs(carrier_config.token_ttl_hours * 3600),
            pickup_location: carrier_config.pickup_location.clone(),
            package: PackageDimensions {
                length_cm: carrier_config.package_length_cm,
                breadth_cm: carrier_config.package_breadth_cm,
                height_cm: carrier_config.package_height_cm,
                weight_kg: carrier_config.package_weight_kg,
            },
        },
    ));

    // Notifiers
    let mut notifiers: Vec<Arc<dyn OrderNotifier>> = vec![Arc::new(TracingNotifier)];
    if let Some(kafka) = &config.kafka {
        let producer = EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?;
        notifiers.push(Arc::new(KafkaOrderNotifier::new(producer, kafka.order_topic.clone())));
    }

    // Redis (optional)
    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url).await.context("Failed to connect to Redis")?,
        )),
        None => {
            tracing::info!("Redis not configured; rate limiting disabled");
            None
        }
    };

    let checkout = CheckoutService::new(
        OrderAssembler::new(
            PriceResolver::new(catalog),
            customers,
            orders.clone(),
            OrderNumberGenerator::new(config.checkout.order_number_prefix.as_str()),
        ),
        fulfillment.clone(),
        NotificationDispatcher::new(notifiers),
        config.checkout.auto_dispatch,
    );

    let _sweeper = worker::start_dispatch_sweeper(orders.clone(), fulfillment.clone(), &config.fulfillment);

    let app_state = AppState {
        checkout: Arc::new(checkout),
        orders,
        fulfillment,
        redis,
        rate_limit_per_minute: config.server.rate_limit_per_minute,
        metrics: Arc::new(Metrics::new().context("Failed to register metrics")?),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("Failed to bind")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>()
    ).await.context("Server error")?;

    Ok(())
}

pub mod app_config;
pub mod database;
pub mod catalog_repo;
pub mod customer_repo;
pub mod order_repo;
pub mod redis_repo;
pub mod events;
pub mod carrier_client;

pub use app_config::Config;
pub use database::DbClient;
pub use catalog_repo::PgCatalogRepository;
pub use customer_repo::PgCustomerRepository;
pub use order_repo::PgOrderRepository;
pub use redis_repo::RedisClient;
pub use events::{EventProducer, KafkaOrderNotifier};
pub use carrier_client::HttpCarrierClient;

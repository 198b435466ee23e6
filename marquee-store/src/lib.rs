pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod hold_repo;
pub mod redis_repo;

pub use catalog_repo::StoreResourceRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use hold_repo::StoreHoldRepository;
pub use redis_repo::RedisClient;

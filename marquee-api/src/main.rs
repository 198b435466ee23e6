use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marquee_api::metrics::{spawn_event_counter, ApiMetrics};
use marquee_api::state::{AppState, AuthConfig, RateLimit};
use marquee_api::{app, worker};
use marquee_catalog::{load_seed_file, InMemoryResourceCatalog, PricingEngine};
use marquee_core::reminder::{InMemoryReminderStore, ReminderStore};
use marquee_core::repository::{HoldRepository, ResourceRepository};
use marquee_core::SystemClock;
use marquee_hold::{spawn_expiry_sweeper, HoldManager, HoldPolicy, InMemoryHoldRepository};
use marquee_store::app_config::Config;
use marquee_store::{DbClient, EventProducer, RedisClient, StoreHoldRepository, StoreResourceRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    // Storage: Postgres when configured, otherwise process memory
    let (holds, resources, rules) = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url).await.context("Failed to connect to Postgres")?;
            if config.database.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
            }
            let rules = db
                .fetch_hold_rules(config.holds.clone())
                .await
                .context("Failed to load business rules")?;
            (
                Arc::new(StoreHoldRepository::new(db.pool.clone())) as Arc<dyn HoldRepository>,
                Arc::new(StoreResourceRepository::new(db.pool.clone())) as Arc<dyn ResourceRepository>,
                rules,
            )
        }
        None => {
            tracing::warn!("No database configured, holds are kept in memory");
            (
                Arc::new(InMemoryHoldRepository::new()) as Arc<dyn HoldRepository>,
                Arc::new(InMemoryResourceCatalog::new()) as Arc<dyn ResourceRepository>,
                config.holds.clone(),
            )
        }
    };

    if let Some(seed_file) = &config.catalog.seed_file {
        let seeded = load_seed_file(seed_file).context("Failed to read catalog seed")?;
        for resource in &seeded {
            resources.upsert_resource(resource).await.context("Failed to seed catalog")?;
        }
        tracing::info!("Seeded {} resources from {}", seeded.len(), seed_file);
    }

    let policy = HoldPolicy::new(rules.hold_ttl_seconds, rules.currency.clone())
        .context("Invalid hold rules")?;
    let pricing = PricingEngine::new(config.pricing.clone()).context("Invalid pricing config")?;
    let manager = Arc::new(HoldManager::new(
        holds,
        resources,
        pricing,
        Arc::new(SystemClock),
        policy,
    ));

    let reminders: Arc<dyn ReminderStore> = match &config.reminders.snapshot_path {
        Some(path) => Arc::new(InMemoryReminderStore::open(path).await.context("Failed to open reminders")?),
        None => Arc::new(InMemoryReminderStore::new()),
    };

    // Redis Connection (rate limiting only)
    let rate_limit = match &config.redis.url {
        Some(url) => Some(RateLimit {
            redis: Arc::new(RedisClient::new(url).await.context("Failed to connect to Redis")?),
            requests_per_minute: config.redis.requests_per_minute,
        }),
        None => None,
    };

    // Kafka Connection
    if let Some(brokers) = &config.kafka.brokers {
        let producer = EventProducer::new(brokers).context("Failed to create Kafka producer")?;
        worker::spawn_event_forwarder(manager.subscribe(), Arc::new(producer));
    }

    let metrics = Arc::new(ApiMetrics::new().context("Failed to register metrics")?);
    spawn_event_counter(manager.subscribe(), metrics.clone());

    spawn_expiry_sweeper(manager.clone(), Duration::from_secs(rules.sweep_interval_seconds.max(1)));

    let app_state = AppState {
        manager,
        reminders,
        rate_limit,
        metrics,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rewards: config.rewards,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("Failed to bind")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use judge_core::catalog::Catalog;
use judge_core::config::Config;
use judge_core::queue::RedisQueue;
use judge_core::rendezvous::Rendezvous;
use judge_core::service::SubmissionService;
use judge_core::store::PostgresStore;

use crate::rate_limit::IpRateLimiter;
use crate::rate_limit::build_rate_limiter;

/// Shared, cheaply-`Clone`-able handle axum hands to every request (the
/// `AppState` pattern), holding everything a handler needs behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SubmissionService>,
    pub store: PostgresStore,
    pub queue: RedisQueue,
    pub catalog: Arc<Catalog>,
    pub wait_mode_timeout: Duration,
    /// `None` when `RATE_LIMIT_ENABLED=false`.
    pub rate_limiter: Option<Arc<IpRateLimiter>>,
}

impl AppState {
    pub async fn connect(config: &Config) -> anyhow::Result<(Self, Arc<Rendezvous>)> {
        let store = PostgresStore::connect(&config.database.url).await?;
        store.migrate().await?;
        let queue = RedisQueue::connect(config.redis.clone()).await?;
        let catalog = Arc::new(Catalog::load_default()?);
        let rendezvous = Arc::new(Rendezvous::new());

        let service = Arc::new(SubmissionService::new(
            store.clone(),
            queue.clone(),
            catalog.clone(),
            rendezvous.clone(),
            config.sandbox_defaults.clone(),
        ));

        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| build_rate_limiter(config.rate_limit.requests_per_second, config.rate_limit.burst));

        let state = Self {
            service,
            store,
            queue,
            catalog,
            wait_mode_timeout: config.wait_mode_timeout,
            rate_limiter,
        };
        Ok((state, rendezvous))
    }
}

//! The `judge-worker` process (§2.1/§4.5): `WORKER_CONCURRENCY` independent
//! `judge_core::worker::Worker` loops sharing one Postgres pool and one
//! Redis connection, each claiming jobs from the same queue. Horizontal
//! scaling is running more of this process, not more tasks within one.

#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use judge_core::catalog::Catalog;
use judge_core::config::Config;
use judge_core::queue::RedisQueue;
use judge_core::store::PostgresStore;
use judge_core::worker::Worker;

/// Resolves to a `Notify`-free shutdown signal: a shared flag the SIGINT
/// listener flips, polled by each worker loop between dequeues (mirroring
/// the teacher's `util::notify_on_sigint`, adapted from a one-shot `Notify`
/// to a sticky flag since N workers must all observe the same shutdown).
fn shutdown_on_sigint() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    tokio::spawn({
        let flag = flag.clone();
        async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("received shutdown signal");
            flag.store(true, Ordering::Relaxed);
        }
    });
    flag
}

pub async fn run_main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let store = PostgresStore::connect(&config.database.url).await?;
    store.migrate().await?;
    let catalog = Arc::new(Catalog::load_default()?);
    let shutdown = shutdown_on_sigint();

    std::fs::create_dir_all(&config.scratch_dir)?;

    let mut handles = Vec::with_capacity(config.worker_concurrency as usize);
    for i in 1..=config.worker_concurrency {
        let queue = RedisQueue::connect(config.redis.clone()).await?;
        let worker = Worker::new(
            format!("worker-{i}"),
            store.clone(),
            queue,
            catalog.clone(),
            config.scratch_dir.clone(),
        );
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move { worker.run(shutdown).await }));
    }

    tracing::info!(count = config.worker_concurrency, "judge-worker pool started");

    for handle in handles {
        if let Err(e) = handle.await? {
            tracing::error!(error = %e, "worker loop exited with an error");
        }
    }

    Ok(())
}

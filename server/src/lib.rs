//! The judge's HTTP API (§6): an axum `Router` over `judge-core`'s
//! `SubmissionService`. Grounded on the teacher's pack-mate `opensandbox`
//! example's `mod server` (`AppState` + `Router::with_state` + extractor
//! handlers), since the teacher itself speaks stdio JSON-RPC, not HTTP.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod error;
mod handlers;
mod middleware;
mod rate_limit;
pub mod state;

use axum::Router;
use axum::routing::get;
use judge_core::config::Config;
use tokio::net::TcpListener;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health/ping", get(handlers::health::ping))
        .route("/health/", get(handlers::health::aggregate))
        .route("/health/:section", get(handlers::health::subset))
        .route("/languages/", get(handlers::languages::list))
        .route("/languages/:id", get(handlers::languages::get))
        .route("/submissions/", get(handlers::submissions::list).post(handlers::submissions::create))
        .route(
            "/submissions/batch",
            get(handlers::submissions::get_batch).post(handlers::submissions::create_batch),
        )
        .route(
            "/submissions/:id",
            get(handlers::submissions::get).delete(handlers::submissions::delete),
        )
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit::enforce))
        .layer(axum::middleware::from_fn(middleware::request_id_span))
        .with_state(state)
}

/// Connects to Postgres/Redis, migrates the schema, spawns the Wait-Mode
/// Redis bridge, and serves the HTTP API until the process is killed.
pub async fn run_main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let (state, rendezvous) = AppState::connect(&config).await?;

    let bridge_queue = state.queue.clone();
    tokio::spawn(async move {
        if let Err(e) = rendezvous.run_redis_bridge(&bridge_queue).await {
            tracing::error!(error = %e, "wait-mode redis bridge exited");
        }
    });

    let listener = TcpListener::bind(&config.http_bind_addr).await?;
    tracing::info!(addr = %config.http_bind_addr, "judge-server listening");
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

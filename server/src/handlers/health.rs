//! `/health/*` (§6): liveness/readiness probes an operator or orchestrator
//! polls. Never returns a non-2xx status — a failing dependency is reported
//! in the body's `status` field, not the HTTP status code, since the judge
//! itself is still up and able to answer.

use std::time::Instant;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct PingResponse {
    status: &'static str,
    message: &'static str,
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { status: "ok", message: "pong" })
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    status: &'static str,
    response_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct RedisHealth {
    status: &'static str,
    response_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    ping: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct WorkersHealth {
    queue_name: String,
    queue_size: u64,
    workers_total: u64,
    workers_busy: u64,
    workers_idle: u64,
    failed_jobs: u64,
    status: &'static str,
}

#[derive(Serialize)]
pub struct InfoHealth {
    version: &'static str,
    languages: Vec<judge_protocol::language::LanguageSummary>,
    sandbox_defaults: judge_protocol::submission::SandboxLimits,
}

#[derive(Serialize)]
pub struct AggregateHealth {
    status: &'static str,
    database: DatabaseHealth,
    redis: RedisHealth,
    workers: WorkersHealth,
}

async fn database_health(state: &AppState) -> DatabaseHealth {
    let start = Instant::now();
    match state.store.ping().await {
        Ok(()) => DatabaseHealth {
            status: "ok",
            response_time: start.elapsed().as_secs_f64(),
            error: None,
        },
        Err(e) => DatabaseHealth {
            status: "error",
            response_time: start.elapsed().as_secs_f64(),
            error: Some(e.to_string()),
        },
    }
}

async fn redis_health(state: &AppState) -> RedisHealth {
    let start = Instant::now();
    match state.queue.ping().await {
        Ok(pong) => RedisHealth {
            status: "ok",
            response_time: start.elapsed().as_secs_f64(),
            ping: Some(pong),
            error: None,
        },
        Err(e) => RedisHealth {
            status: "error",
            response_time: start.elapsed().as_secs_f64(),
            ping: None,
            error: Some(e.to_string()),
        },
    }
}

async fn workers_health(state: &AppState) -> WorkersHealth {
    let queue_size = state.queue.size().await.unwrap_or(0);
    let failed_jobs = state.queue.failed_count().await.unwrap_or(0);
    let workers = state.queue.list_workers().await.unwrap_or_default();
    let workers_busy = workers
        .iter()
        .filter(|w| w.state == judge_core::queue::WorkerState::Busy)
        .count() as u64;
    WorkersHealth {
        queue_name: state.queue.queue_name(),
        queue_size,
        workers_total: workers.len() as u64,
        workers_busy,
        workers_idle: workers.len() as u64 - workers_busy,
        failed_jobs,
        status: if workers.is_empty() { "no workers registered" } else { "ok" },
    }
}

fn info_health(state: &AppState) -> InfoHealth {
    InfoHealth {
        version: env!("CARGO_PKG_VERSION"),
        languages: state.catalog.list(),
        sandbox_defaults: state.service.default_limits(),
    }
}

pub async fn aggregate(State(state): State<AppState>) -> Json<AggregateHealth> {
    let database = database_health(&state).await;
    let redis = redis_health(&state).await;
    let workers = workers_health(&state).await;
    let status = if database.status == "ok" && redis.status == "ok" { "ok" } else { "degraded" };
    Json(AggregateHealth { status, database, redis, workers })
}

pub async fn subset(State(state): State<AppState>, Path(section): Path<String>) -> Result<axum::response::Response, StatusCode> {
    use axum::response::IntoResponse;
    match section.as_str() {
        "database" => Ok(Json(database_health(&state).await).into_response()),
        "redis" => Ok(Json(redis_health(&state).await).into_response()),
        "workers" => Ok(Json(workers_health(&state).await).into_response()),
        "info" => Ok(Json(info_health(&state)).into_response()),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

//! Job Queue (§4.4/§4.4.1): a Redis-backed FIFO of submission ids, a worker
//! registry, and a failed-job list. The only cross-process synchronization
//! point between the API and the worker pool.

use judge_protocol::error::JudgeError;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::config::RedisConfig;

fn infra(e: redis::RedisError) -> JudgeError {
    JudgeError::infrastructure(e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Busy,
}

impl WorkerState {
    fn as_str(self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Busy => "busy",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub name: String,
    pub state: WorkerState,
}

#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    config: RedisConfig,
}

impl RedisQueue {
    pub async fn connect(config: RedisConfig) -> Result<Self, JudgeError> {
        let client = redis::Client::open(config.connection_url()).map_err(infra)?;
        let conn = client.get_connection_manager().await.map_err(infra)?;
        Ok(Self { conn, config })
    }

    /// `RPUSH` — enqueues at the tail, preserving FIFO order.
    pub async fn enqueue(&self, id: Uuid) -> Result<(), JudgeError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(self.config.queue_key(), id.to_string())
            .await
            .map_err(infra)
    }

    /// `BLPOP` with the caller-supplied timeout, in whole seconds (Redis'
    /// blocking-pop timeout granularity).
    pub async fn dequeue(&self, timeout: std::time::Duration) -> Result<Option<Uuid>, JudgeError> {
        let mut conn = self.conn.clone();
        let result: Option<(String, String)> = conn
            .blpop(self.config.queue_key(), timeout.as_secs_f64())
            .await
            .map_err(infra)?;
        match result {
            Some((_, raw_id)) => Uuid::parse_str(&raw_id)
                .map(Some)
                .map_err(|e| JudgeError::infrastructure(format!("corrupt queue entry: {e}"))),
            None => Ok(None),
        }
    }

    pub async fn size(&self) -> Result<u64, JudgeError> {
        let mut conn = self.conn.clone();
        conn.llen(self.config.queue_key()).await.map_err(infra)
    }

    pub async fn failed_count(&self) -> Result<u64, JudgeError> {
        let mut conn = self.conn.clone();
        conn.llen(self.config.failed_key()).await.map_err(infra)
    }

    /// Records an abandoned (crashed mid-processing) job, distinct from a
    /// normal `ERROR` terminal submission (§4.4.1).
    pub async fn record_abandoned(&self, id: Uuid) -> Result<(), JudgeError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(self.config.failed_key(), id.to_string())
            .await
            .map_err(infra)
    }

    pub async fn register_worker(&self, name: &str) -> Result<(), JudgeError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(self.config.workers_key(), name, WorkerState::Idle.as_str())
            .await
            .map_err(infra)
    }

    pub async fn set_worker_state(&self, name: &str, state: WorkerState) -> Result<(), JudgeError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(self.config.workers_key(), name, state.as_str())
            .await
            .map_err(infra)
    }

    pub async fn unregister_worker(&self, name: &str) -> Result<(), JudgeError> {
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(self.config.workers_key(), name).await.map_err(infra)
    }

    pub async fn list_workers(&self) -> Result<Vec<WorkerStatus>, JudgeError> {
        let mut conn = self.conn.clone();
        let raw: std::collections::HashMap<String, String> =
            conn.hgetall(self.config.workers_key()).await.map_err(infra)?;
        Ok(raw
            .into_iter()
            .map(|(name, state)| WorkerStatus {
                name,
                state: if state == "busy" { WorkerState::Busy } else { WorkerState::Idle },
            })
            .collect())
    }

    /// Publishes `id` on the completion channel so every `judge-server`
    /// process' Wait-Mode bridge can wake a local waiter (§4.7).
    pub async fn publish_completed(&self, id: Uuid) -> Result<(), JudgeError> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(self.config.completed_channel(), id.to_string())
            .await
            .map_err(infra)
    }

    pub fn completed_channel(&self) -> String {
        self.config.completed_channel()
    }

    pub fn connection_url(&self) -> String {
        self.config.connection_url()
    }

    pub fn queue_name(&self) -> String {
        self.config.queue_key()
    }

    /// Round-trips a Redis `PING` for the health endpoint.
    pub async fn ping(&self) -> Result<String, JudgeError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async(&mut conn).await.map_err(infra)
    }
}

//! Wait-Mode Rendezvous (§4.7): a process-local map from submission id to a
//! one-shot completion signal, bridged across process boundaries by
//! subscribing to the Job Queue's Redis Pub/Sub completion channel (since
//! workers and the API are separate OS processes, §2.1).

// A poisoned mutex means some other thread panicked while holding the
// waiters map; there's no sane way to keep serving requests from a
// corrupted map, so this propagates the panic rather than limping on.
#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::StreamExt;
use judge_protocol::error::JudgeError;
use judge_protocol::submission::Submission;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::queue::RedisQueue;
use crate::store::PostgresStore;

pub struct Rendezvous {
    waiters: Mutex<HashMap<Uuid, Arc<Notify>>>,
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl Rendezvous {
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Must be called before the submission is enqueued, so a fast worker
    /// can never complete-and-publish before the waiter exists.
    pub fn register(&self, id: Uuid) {
        self.waiters
            .lock()
            .expect("rendezvous mutex poisoned")
            .entry(id)
            .or_insert_with(|| Arc::new(Notify::new()));
    }

    /// Blocks until `Publish(id)` fires or `deadline` elapses, then re-reads
    /// the store. On timeout the waiter is unregistered but the submission
    /// keeps running (§4.7).
    pub async fn await_terminal(
        &self,
        id: Uuid,
        deadline: Duration,
        store: &PostgresStore,
    ) -> Result<Submission, JudgeError> {
        let notify = {
            let mut waiters = self.waiters.lock().expect("rendezvous mutex poisoned");
            waiters.entry(id).or_insert_with(|| Arc::new(Notify::new())).clone()
        };

        let outcome = tokio::time::timeout(deadline, notify.notified()).await;
        self.waiters.lock().expect("rendezvous mutex poisoned").remove(&id);

        match outcome {
            Ok(()) => store.get(id).await?.ok_or(JudgeError::NotFound),
            Err(_) => Err(JudgeError::WaitTimeout),
        }
    }

    /// Idempotent; safe to call with no local waiter registered (the common
    /// case when the committing worker is a different `judge-worker`
    /// process than the one that registered the wait).
    pub fn publish_local(&self, id: Uuid) {
        if let Some(notify) = self.waiters.lock().expect("rendezvous mutex poisoned").get(&id) {
            notify.notify_waiters();
        }
    }

    /// Subscribes to the Redis completion channel and fans incoming ids out
    /// to `publish_local`. Runs until the process exits; spawned once per
    /// `judge-server` process at startup.
    pub async fn run_redis_bridge(self: Arc<Self>, queue: &RedisQueue) -> Result<(), JudgeError> {
        let client = redis::Client::open(queue.connection_url())
            .map_err(|e| JudgeError::infrastructure(e.to_string()))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| JudgeError::infrastructure(e.to_string()))?;
        pubsub
            .subscribe(queue.completed_channel())
            .await
            .map_err(|e| JudgeError::infrastructure(e.to_string()))?;

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed rendezvous pub/sub payload");
                    continue;
                }
            };
            match Uuid::parse_str(&payload) {
                Ok(id) => self.publish_local(id),
                Err(e) => tracing::warn!(error = %e, payload, "non-uuid rendezvous pub/sub payload"),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_with_no_waiter_is_a_no_op() {
        let rendezvous = Rendezvous::new();
        rendezvous.publish_local(Uuid::new_v4());
    }

    #[tokio::test]
    async fn register_then_publish_wakes_the_notify() {
        let rendezvous = Arc::new(Rendezvous::new());
        let id = Uuid::new_v4();
        rendezvous.register(id);

        let notify = rendezvous
            .waiters
            .lock()
            .unwrap()
            .get(&id)
            .expect("registered")
            .clone();

        let waiting = tokio::spawn(async move {
            notify.notified().await;
        });

        rendezvous.publish_local(id);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("should not time out")
            .unwrap();
    }
}

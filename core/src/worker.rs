//! Worker (§4.5): the dequeue/process/commit loop. `WORKER_CONCURRENCY`
//! instances of this loop run as independent Tokio tasks inside one
//! `judge-worker` process (§5); horizontal scaling runs more processes.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use judge_protocol::error::JudgeError;
use judge_protocol::submission::Submission;
use judge_protocol::submission::SubmissionMeta;
use judge_protocol::submission::SubmissionStatus;
use judge_sandbox::SandboxResult;
use judge_sandbox::SandboxSpec;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::queue::RedisQueue;
use crate::queue::WorkerState;
use crate::store::PostgresStore;
use crate::store::ResultUpdate;
use crate::store::UpdateOutcome;

/// Paths a compiler/interpreter legitimately needs beyond the scratch
/// directory (its own install prefix, the dynamic linker cache, ...).
const TOOLCHAIN_READ_ROOTS: &[&str] = &["/usr", "/lib", "/lib64", "/etc", "/bin", "/opt"];

/// How long a single `BLPOP` waits before re-checking the shutdown flag.
const DEQUEUE_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct Worker {
    name: String,
    store: PostgresStore,
    queue: RedisQueue,
    catalog: Arc<Catalog>,
    scratch_base: PathBuf,
}

impl Worker {
    pub fn new(name: String, store: PostgresStore, queue: RedisQueue, catalog: Arc<Catalog>, scratch_base: PathBuf) -> Self {
        Self {
            name,
            store,
            queue,
            catalog,
            scratch_base,
        }
    }

    /// Runs until `shutdown` is set. Dequeues with a short poll interval so
    /// shutdown is observed promptly even while idle.
    pub async fn run(self, shutdown: Arc<AtomicBool>) -> Result<(), JudgeError> {
        self.queue.register_worker(&self.name).await?;
        tracing::info!(worker_name = %self.name, "worker started");

        while !shutdown.load(Ordering::Relaxed) {
            let id = match self.queue.dequeue(DEQUEUE_POLL_INTERVAL).await {
                Ok(Some(id)) => id,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(worker_name = %self.name, error = %e, "dequeue failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            self.queue.set_worker_state(&self.name, WorkerState::Busy).await.ok();
            if let Err(e) = self.process_one(id).await {
                tracing::error!(worker_name = %self.name, submission_id = %id, error = %e, "failed to process submission");
            }
            self.queue.set_worker_state(&self.name, WorkerState::Idle).await.ok();
        }

        self.queue.unregister_worker(&self.name).await?;
        tracing::info!(worker_name = %self.name, "worker stopped");
        Ok(())
    }

    async fn process_one(&self, id: Uuid) -> Result<(), JudgeError> {
        tracing::info!(worker_name = %self.name, submission_id = %id, "dequeued submission");

        let submission = match self.store.get(id).await? {
            Some(s) => s,
            None => return Ok(()), // deleted before it was ever picked up
        };

        self.mark_processing(id).await?;

        let language = match self.catalog.get(submission.language_id) {
            Some(l) => l.clone(),
            None => {
                return self
                    .commit(
                        id,
                        SubmissionStatus::Error,
                        None,
                        Some(b"Unknown language".to_vec()),
                        None,
                        None,
                    )
                    .await;
            }
        };

        let scratch = match tempfile::Builder::new()
            .prefix(&format!("judge-{id}-"))
            .tempdir_in(&self.scratch_base)
        {
            Ok(dir) => dir,
            Err(e) => {
                return self
                    .commit(
                        id,
                        SubmissionStatus::Error,
                        None,
                        Some(format!("failed to create scratch directory: {e}").into_bytes()),
                        None,
                        None,
                    )
                    .await;
            }
        };
        let scratch_dir = scratch.path().to_path_buf();

        if let Err(e) = materialize_files(&scratch_dir, &language.source_filename, &submission) {
            return self
                .commit(id, SubmissionStatus::Error, None, Some(e.into_bytes()), None, None)
                .await;
        }

        let extra_read_roots: Vec<PathBuf> = TOOLCHAIN_READ_ROOTS.iter().map(PathBuf::from).collect();
        let env = vec![("PATH".to_string(), "/usr/local/bin:/usr/bin:/bin".to_string())];

        if let Some(compile_cmd) = &language.compile_cmd {
            let compile_result = self
                .run_in_sandbox(compile_cmd, &scratch_dir, &extra_read_roots, None, &env, &submission)
                .await;
            match compile_result {
                Ok(result) if result.exit_code == Some(0) => {}
                Ok(result) => {
                    let outcome = self
                        .commit(
                            id,
                            SubmissionStatus::Error,
                            None,
                            None,
                            Some(result.stderr),
                            None,
                        )
                        .await;
                    let _ = scratch.close();
                    return outcome;
                }
                Err(e) => {
                    let outcome = self
                        .commit(
                            id,
                            SubmissionStatus::Error,
                            None,
                            Some(format!("sandbox error during compile: {e}").into_bytes()),
                            None,
                            None,
                        )
                        .await;
                    let _ = scratch.close();
                    return outcome;
                }
            }
        }

        let run_result = self
            .run_in_sandbox(
                &language.run_cmd,
                &scratch_dir,
                &extra_read_roots,
                submission.stdin.as_deref(),
                &env,
                &submission,
            )
            .await;

        let outcome = match run_result {
            Ok(result) => {
                let output_matches = submission
                    .expected_output
                    .as_ref()
                    .map(|expected| expected == &result.stdout);
                tracing::info!(
                    worker_name = %self.name,
                    submission_id = %id,
                    message = %result.message,
                    elapsed = %judge_common::elapsed::format_duration(std::time::Duration::from_secs_f64(result.time)),
                    "sandbox run classified"
                );
                let meta = SubmissionMeta {
                    time: result.time,
                    memory: result.memory,
                    exit_code: result.exit_code,
                    signal: result.signal.clone(),
                    message: Some(result.message.clone()),
                    output_matches,
                };
                self.commit(
                    id,
                    SubmissionStatus::Finished,
                    Some(result.stdout),
                    Some(result.stderr),
                    None,
                    Some(meta),
                )
                .await
            }
            Err(e) => {
                self.commit(
                    id,
                    SubmissionStatus::Error,
                    None,
                    Some(format!("sandbox internal error: {e}").into_bytes()),
                    None,
                    None,
                )
                .await
            }
        };

        if let Err(e) = scratch.close() {
            tracing::warn!(worker_name = %self.name, submission_id = %id, error = %e, "failed to remove scratch directory");
        }

        outcome
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), JudgeError> {
        let outcome = self
            .store
            .update_result(
                id,
                ResultUpdate {
                    status: SubmissionStatus::Processing,
                    stdout: None,
                    stderr: None,
                    compile_output: None,
                    meta: None,
                },
            )
            .await?;
        match outcome {
            UpdateOutcome::Ok => Ok(()),
            // Another worker already claimed it, or it was deleted/cancelled
            // before dequeue; either way this worker has nothing to do.
            UpdateOutcome::IllegalTransition | UpdateOutcome::NotFound | UpdateOutcome::Discarded => Ok(()),
        }
    }

    async fn run_in_sandbox(
        &self,
        command: &str,
        cwd: &Path,
        extra_read_roots: &[PathBuf],
        stdin: Option<&[u8]>,
        env: &[(String, String)],
        submission: &Submission,
    ) -> Result<SandboxResult, judge_sandbox::SandboxError> {
        let argv = shlex::split(command).unwrap_or_else(|| vec![command.to_string()]);
        judge_sandbox::run(SandboxSpec {
            command: argv,
            cwd: cwd.to_path_buf(),
            extra_read_roots: extra_read_roots.to_vec(),
            stdin: stdin.map(<[u8]>::to_vec),
            env: env.to_vec(),
            limits: submission.limits,
        })
        .await
    }

    async fn commit(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        stdout: Option<Vec<u8>>,
        stderr: Option<Vec<u8>>,
        compile_output: Option<Vec<u8>>,
        meta: Option<SubmissionMeta>,
    ) -> Result<(), JudgeError> {
        let outcome = self
            .store
            .update_result(
                id,
                ResultUpdate {
                    status,
                    stdout,
                    stderr,
                    compile_output,
                    meta,
                },
            )
            .await?;

        match outcome {
            UpdateOutcome::Ok => {
                self.queue.publish_completed(id).await?;
            }
            UpdateOutcome::Discarded => {
                tracing::info!(worker_name = %self.name, submission_id = %id, "result discarded: submission was deleted mid-processing");
            }
            UpdateOutcome::NotFound => {
                tracing::warn!(worker_name = %self.name, submission_id = %id, "submission vanished before commit");
            }
            UpdateOutcome::IllegalTransition => {
                tracing::error!(worker_name = %self.name, submission_id = %id, "illegal status transition on commit");
            }
        }

        Ok(())
    }
}

fn materialize_files(scratch_dir: &Path, source_filename: &str, submission: &Submission) -> Result<(), String> {
    std::fs::write(scratch_dir.join(source_filename), &submission.source_code)
        .map_err(|e| format!("failed to write source file: {e}"))?;

    for file in &submission.additional_files {
        std::fs::write(scratch_dir.join(&file.name), &file.content)
            .map_err(|e| format!("failed to write additional file {}: {e}", file.name))?;
    }

    Ok(())
}

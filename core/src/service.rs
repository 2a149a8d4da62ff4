//! Submission Service (§4.6): validates, persists, enqueues, and (in wait
//! mode) awaits a submission's terminal result. The only entry point the
//! HTTP layer calls into.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use judge_protocol::base64_transport;
use judge_protocol::error::JudgeError;
use judge_protocol::pagination::Page;
use judge_protocol::submission::AdditionalFile;
use judge_protocol::submission::CreateSubmissionRequest;
use judge_protocol::submission::SandboxLimits;
use judge_protocol::submission::Submission;
use judge_protocol::submission::SubmissionStatus;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::SandboxDefaults;
use crate::queue::RedisQueue;
use crate::rendezvous::Rendezvous;
use crate::store::PostgresStore;

pub struct SubmissionService {
    store: PostgresStore,
    queue: RedisQueue,
    catalog: Arc<Catalog>,
    rendezvous: Arc<Rendezvous>,
    defaults: SandboxDefaults,
}

impl SubmissionService {
    pub fn new(
        store: PostgresStore,
        queue: RedisQueue,
        catalog: Arc<Catalog>,
        rendezvous: Arc<Rendezvous>,
        defaults: SandboxDefaults,
    ) -> Self {
        Self {
            store,
            queue,
            catalog,
            rendezvous,
            defaults,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn default_limits(&self) -> SandboxLimits {
        self.defaults.limits
    }

    fn build_submission(&self, payload: CreateSubmissionRequest, base64_encoded: bool) -> Result<Submission, JudgeError> {
        if self.catalog.get(payload.language_id).is_none() {
            return Err(JudgeError::validation(format!(
                "unknown language_id {}",
                payload.language_id
            )));
        }

        let source_code = base64_transport::decode_field("source_code", &payload.source_code, base64_encoded)
            .map_err(|e| JudgeError::validation(e.to_string()))?;
        let stdin = base64_transport::decode_optional_field("stdin", payload.stdin.as_deref(), base64_encoded)
            .map_err(|e| JudgeError::validation(e.to_string()))?;
        let expected_output = base64_transport::decode_optional_field(
            "expected_output",
            payload.expected_output.as_deref(),
            base64_encoded,
        )
        .map_err(|e| JudgeError::validation(e.to_string()))?;

        if payload.additional_files.len() > self.defaults.max_additional_files as usize {
            return Err(JudgeError::validation("too many additional_files"));
        }

        let mut additional_files = Vec::with_capacity(payload.additional_files.len());
        let mut total_size: u64 = 0;
        for file in payload.additional_files {
            if file.name.contains('/') || file.name.contains('\\') || file.name.contains("..") {
                return Err(JudgeError::validation(format!(
                    "additional_files entry {:?} must not contain a path separator or '..'",
                    file.name
                )));
            }
            let content = base64_transport::decode_field("additional_files[].content", &file.content, base64_encoded)
                .map_err(|e| JudgeError::validation(e.to_string()))?;
            total_size += content.len() as u64;
            additional_files.push(AdditionalFile { name: file.name, content });
        }
        if total_size > self.defaults.max_additional_files_size.saturating_mul(1024) {
            return Err(JudgeError::validation("additional_files total size exceeds the configured cap"));
        }

        let limits = merge_limits(&self.defaults.limits, &payload);
        validate_limits(&limits)?;

        Ok(Submission {
            id: Uuid::new_v4(),
            language_id: payload.language_id,
            source_code,
            stdin,
            expected_output,
            additional_files,
            limits,
            status: SubmissionStatus::Pending,
            stdout: None,
            stderr: None,
            compile_output: None,
            meta: None,
            created_at: Utc::now(),
        })
    }

    /// `wait=false`: returns the created id immediately. `wait=true`: blocks
    /// up to the configured wait-mode budget for the terminal submission.
    pub async fn create_submission(
        &self,
        payload: CreateSubmissionRequest,
        base64_encoded: bool,
        wait: bool,
        wait_timeout: Duration,
    ) -> Result<CreateOutcome, JudgeError> {
        let submission = self.build_submission(payload, base64_encoded)?;
        let id = submission.id;

        if wait {
            self.rendezvous.register(id);
        }

        self.store.create(&submission).await?;
        self.queue.enqueue(id).await?;

        if !wait {
            return Ok(CreateOutcome::Accepted(id));
        }

        match self.rendezvous.await_terminal(id, wait_timeout, &self.store).await {
            Ok(submission) => Ok(CreateOutcome::Finished(Box::new(submission))),
            Err(JudgeError::WaitTimeout) => Ok(CreateOutcome::TimedOut(id)),
            Err(e) => Err(e),
        }
    }

    /// Each payload is validated independently; the whole batch is rejected
    /// on the first invalid entry — no partial commits (§4.6).
    pub async fn create_batch(
        &self,
        payloads: Vec<CreateSubmissionRequest>,
        base64_encoded: bool,
    ) -> Result<Vec<Uuid>, JudgeError> {
        let mut submissions = Vec::with_capacity(payloads.len());
        for payload in payloads {
            submissions.push(self.build_submission(payload, base64_encoded)?);
        }

        let mut ids = Vec::with_capacity(submissions.len());
        for submission in &submissions {
            self.store.create(submission).await?;
            ids.push(submission.id);
        }
        for id in &ids {
            self.queue.enqueue(*id).await?;
        }

        Ok(ids)
    }

    pub async fn get_submission(&self, id: Uuid) -> Result<Submission, JudgeError> {
        self.store.get(id).await?.ok_or(JudgeError::NotFound)
    }

    pub async fn get_batch(&self, ids: &[Uuid]) -> Result<Vec<Submission>, JudgeError> {
        self.store.get_many(ids).await
    }

    pub async fn list_submissions(&self, page: u32, page_size: u32) -> Result<Page<Submission>, JudgeError> {
        let (items, total_items) = self.store.list(page, page_size).await?;
        Ok(Page::new(items, total_items, page, page_size))
    }

    pub async fn delete_submission(&self, id: Uuid) -> Result<(), JudgeError> {
        if self.store.delete(id).await? { Ok(()) } else { Err(JudgeError::NotFound) }
    }
}

pub enum CreateOutcome {
    Accepted(Uuid),
    Finished(Box<Submission>),
    TimedOut(Uuid),
}

fn merge_limits(defaults: &SandboxLimits, payload: &CreateSubmissionRequest) -> SandboxLimits {
    SandboxLimits {
        cpu_time_limit: payload.cpu_time_limit.unwrap_or(defaults.cpu_time_limit),
        cpu_extra_time: payload.cpu_extra_time.unwrap_or(defaults.cpu_extra_time),
        wall_time_limit: payload.wall_time_limit.unwrap_or(defaults.wall_time_limit),
        memory_limit: payload.memory_limit.unwrap_or(defaults.memory_limit),
        max_processes_and_or_threads: payload
            .max_processes_and_or_threads
            .unwrap_or(defaults.max_processes_and_or_threads),
        max_file_size: payload.max_file_size.unwrap_or(defaults.max_file_size),
        number_of_runs: payload.number_of_runs.unwrap_or(defaults.number_of_runs),
        enable_per_process_and_thread_time_limit: payload
            .enable_per_process_and_thread_time_limit
            .unwrap_or(defaults.enable_per_process_and_thread_time_limit),
        enable_per_process_and_thread_memory_limit: payload
            .enable_per_process_and_thread_memory_limit
            .unwrap_or(defaults.enable_per_process_and_thread_memory_limit),
        redirect_stderr_to_stdout: payload
            .redirect_stderr_to_stdout
            .unwrap_or(defaults.redirect_stderr_to_stdout),
        enable_network: payload.enable_network.unwrap_or(defaults.enable_network),
    }
}

fn validate_limits(limits: &SandboxLimits) -> Result<(), JudgeError> {
    if limits.cpu_time_limit < 0.0 || limits.cpu_extra_time < 0.0 || limits.wall_time_limit < 0.0 {
        return Err(JudgeError::validation("time limits must be non-negative"));
    }
    if limits.number_of_runs < 1 {
        return Err(JudgeError::validation("number_of_runs must be >= 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_limits_prefers_payload_overrides() {
        let defaults = SandboxLimits {
            cpu_time_limit: 2.0,
            cpu_extra_time: 0.5,
            wall_time_limit: 5.0,
            memory_limit: 128_000,
            max_processes_and_or_threads: 128,
            max_file_size: 10_240,
            number_of_runs: 1,
            enable_per_process_and_thread_time_limit: false,
            enable_per_process_and_thread_memory_limit: false,
            redirect_stderr_to_stdout: false,
            enable_network: false,
        };
        let payload = CreateSubmissionRequest {
            language_id: 1,
            source_code: String::new(),
            stdin: None,
            expected_output: None,
            additional_files: vec![],
            cpu_time_limit: Some(9.0),
            cpu_extra_time: None,
            wall_time_limit: None,
            memory_limit: None,
            max_processes_and_or_threads: None,
            max_file_size: None,
            number_of_runs: None,
            enable_per_process_and_thread_time_limit: None,
            enable_per_process_and_thread_memory_limit: None,
            redirect_stderr_to_stdout: None,
            enable_network: None,
        };
        let merged = merge_limits(&defaults, &payload);
        assert_eq!(merged.cpu_time_limit, 9.0);
        assert_eq!(merged.wall_time_limit, 5.0);
    }

    #[test]
    fn rejects_negative_time_limits() {
        let mut limits = SandboxLimits {
            cpu_time_limit: -1.0,
            cpu_extra_time: 0.5,
            wall_time_limit: 5.0,
            memory_limit: 1,
            max_processes_and_or_threads: 1,
            max_file_size: 1,
            number_of_runs: 1,
            enable_per_process_and_thread_time_limit: false,
            enable_per_process_and_thread_memory_limit: false,
            redirect_stderr_to_stdout: false,
            enable_network: false,
        };
        assert!(validate_limits(&limits).is_err());
        limits.cpu_time_limit = 1.0;
        assert!(validate_limits(&limits).is_ok());
    }
}

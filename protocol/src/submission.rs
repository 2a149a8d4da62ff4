use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// A named byte blob materialized alongside the source file in the sandbox
/// scratch directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Sandbox resource limits. Every field has a configured default (see
/// `judge_core::config::SandboxDefaults`); a submission may override any
/// subset at create time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SandboxLimits {
    pub cpu_time_limit: f64,
    pub cpu_extra_time: f64,
    pub wall_time_limit: f64,
    pub memory_limit: u64,
    pub max_processes_and_or_threads: u32,
    pub max_file_size: u64,
    pub number_of_runs: u32,
    pub enable_per_process_and_thread_time_limit: bool,
    pub enable_per_process_and_thread_memory_limit: bool,
    pub redirect_stderr_to_stdout: bool,
    pub enable_network: bool,
}

/// The sum type driving the submission lifecycle. Status advances
/// monotonically; once a value in `{Finished, Error, Cancelled}` is reached,
/// it never changes (see `judge_core::store`'s `UpdateResult`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionStatus {
    Pending,
    Processing,
    Finished,
    Error,
    Cancelled,
}

impl SubmissionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubmissionStatus::Finished | SubmissionStatus::Error | SubmissionStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal transition under the monotonic-status
    /// invariant (§3 of the spec). Pending can only move to Processing or
    /// Cancelled (a delete before a worker ever picks it up); Processing can
    /// move to any terminal state; terminal states are final.
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        match (self, next) {
            (Pending, Processing) => true,
            (Pending, Cancelled) => true,
            (Processing, Finished) => true,
            (Processing, Error) => true,
            (Processing, Cancelled) => true,
            _ => false,
        }
    }
}

/// Resource telemetry and exit classification of an executed program. Set
/// only once a program actually ran (including a killed/TLE run).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubmissionMeta {
    /// Wall time of the slowest run, in seconds.
    pub time: f64,
    /// Peak memory of the slowest run, in KB.
    pub memory: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_matches: Option<bool>,
}

/// The central entity: a single code-execution request and its evolving
/// result (§3 of the spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub language_id: i16,
    pub source_code: Vec<u8>,
    pub stdin: Option<Vec<u8>>,
    pub expected_output: Option<Vec<u8>>,
    pub additional_files: Vec<AdditionalFile>,
    pub limits: SandboxLimits,

    pub status: SubmissionStatus,
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
    pub compile_output: Option<Vec<u8>>,
    pub meta: Option<SubmissionMeta>,

    pub created_at: DateTime<Utc>,
}

/// Client-facing create payload. Byte fields arrive as plain JSON strings;
/// the base64 transport boundary (`judge_protocol::base64_transport`)
/// decides whether those strings are raw UTF-8 or base64, never this type.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubmissionRequest {
    pub language_id: i16,
    #[serde(default)]
    pub source_code: String,
    #[serde(default)]
    pub stdin: Option<String>,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub additional_files: Vec<AdditionalFileRequest>,

    #[serde(default)]
    pub cpu_time_limit: Option<f64>,
    #[serde(default)]
    pub cpu_extra_time: Option<f64>,
    #[serde(default)]
    pub wall_time_limit: Option<f64>,
    #[serde(default)]
    pub memory_limit: Option<u64>,
    #[serde(default)]
    pub max_processes_and_or_threads: Option<u32>,
    #[serde(default)]
    pub max_file_size: Option<u64>,
    #[serde(default)]
    pub number_of_runs: Option<u32>,
    #[serde(default)]
    pub enable_per_process_and_thread_time_limit: Option<bool>,
    #[serde(default)]
    pub enable_per_process_and_thread_memory_limit: Option<bool>,
    #[serde(default)]
    pub redirect_stderr_to_stdout: Option<bool>,
    #[serde(default)]
    pub enable_network: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdditionalFileRequest {
    pub name: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_only_move_to_processing_or_cancelled() {
        assert!(SubmissionStatus::Pending.can_transition_to(SubmissionStatus::Processing));
        assert!(SubmissionStatus::Pending.can_transition_to(SubmissionStatus::Cancelled));
        assert!(!SubmissionStatus::Pending.can_transition_to(SubmissionStatus::Finished));
        assert!(!SubmissionStatus::Pending.can_transition_to(SubmissionStatus::Error));
    }

    #[test]
    fn processing_can_move_to_any_terminal_state() {
        for terminal in [SubmissionStatus::Finished, SubmissionStatus::Error, SubmissionStatus::Cancelled] {
            assert!(SubmissionStatus::Processing.can_transition_to(terminal));
        }
        assert!(!SubmissionStatus::Processing.can_transition_to(SubmissionStatus::Pending));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [SubmissionStatus::Finished, SubmissionStatus::Error, SubmissionStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                SubmissionStatus::Pending,
                SubmissionStatus::Processing,
                SubmissionStatus::Finished,
                SubmissionStatus::Error,
                SubmissionStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }
}

use thiserror::Error;

/// Domain-level error kinds shared by the submission service, store, and
/// HTTP layer (§7 of the spec). The HTTP status mapping lives in
/// `judge_server` (keeping `axum` out of this crate's dependency graph);
/// this enum only carries the classification and a human-readable message.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// A request failed validation and was never persisted.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested entity does not exist (or was deleted).
    #[error("not found")]
    NotFound,

    /// An internal state transition would violate the monotonic-status
    /// invariant. Not normally user-visible.
    #[error("illegal status transition: {0}")]
    Conflict(String),

    /// Wait-mode's deadline elapsed before the submission reached a terminal
    /// state. Non-fatal: the job continues running.
    #[error("timed out waiting for submission to finish")]
    WaitTimeout,

    /// The database or queue was unreachable.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl JudgeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Self::Infrastructure(msg.into())
    }
}

//! Wire and domain types shared by `judge-server`, `judge-core`, and `judge-worker`.
//!
//! This crate owns the shapes that cross a process boundary (HTTP JSON bodies,
//! the base64 transport encoding) as well as the domain types the core pipeline
//! passes between its own components, so that none of those crates need to
//! agree informally on field names and casing.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod base64_transport;
pub mod error;
pub mod language;
pub mod pagination;
pub mod submission;

pub use error::JudgeError;
pub use language::Language;
pub use pagination::Page;
pub use submission::AdditionalFile;
pub use submission::CreateSubmissionRequest;
pub use submission::SandboxLimits;
pub use submission::Submission;
pub use submission::SubmissionMeta;
pub use submission::SubmissionStatus;

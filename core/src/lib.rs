//! Root of the `judge-core` library: configuration, the Language Catalog,
//! the Submission Store, the Job Queue, the Wait-Mode Rendezvous, the
//! Submission Service, and the Worker loop.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod catalog;
pub mod config;
pub mod queue;
pub mod rendezvous;
pub mod service;
pub mod store;
pub mod worker;

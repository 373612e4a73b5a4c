//! Shared test fixtures for Crowdflow crates.
//!
//! This crate provides payloads and submissions only. It does NOT depend on
//! `crowdflow-engine` or `crowdflow-hub`, so both can use it as a
//! dev-dependency.
//!
//! - [`problems`] - scheduling problem payloads, valid and invalid
//! - [`jobs`] - job submissions for the lifecycle tests
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! crowdflow-test = { workspace = true }
//! ```
//!
//! ```ignore
//! use crowdflow_test::problems::two_groups_chain;
//! use crowdflow_test::jobs::tafweej_submission;
//! ```

pub mod jobs;
pub mod problems;

pub use jobs::{echo_submission, tafweej_submission};
pub use problems::{oversized_group, two_groups_chain};

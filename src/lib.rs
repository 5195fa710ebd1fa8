//! merge-warden: autonomous merge orchestration for pull requests
//!
//! Drives each pull request to one of a small set of terminal outcomes
//! (merged, conflict handed off to a task system, permanently excluded, or
//! reported for a human) through a bounded, idempotent state machine.
//!
//! The main entry point is [`orchestrator::MergeOrchestrator`], assembled from
//! three injected collaborators:
//! - a [`platform::PlatformService`] (GitHub REST/GraphQL in production)
//! - an [`registry::ExclusionRegistry`] (TOML file in production)
//! - a [`delegate::ConflictDelegate`] submitting to a [`delegate::TaskSink`]

pub mod auth;
pub mod config;
pub mod delegate;
pub mod error;
pub mod orchestrator;
pub mod platform;
pub mod registry;
pub mod types;

pub use error::{Error, Result};

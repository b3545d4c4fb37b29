//! GitHub integration
//!
//! Provides:
//! - Workflow context (repository, commit, event payload)
//! - REST client for changed files and comment upserts

mod client;
mod context;

pub use client::*;
pub use context::*;

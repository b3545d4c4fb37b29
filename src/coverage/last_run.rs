//! SimpleCov `.last_run.json` parser

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::utils::read_content;

/// Line and branch percentages recorded by the previous SimpleCov run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LastRunSummary {
    pub line: f64,
    pub branch: f64,
}

#[derive(Debug, Deserialize)]
struct LastRunFile {
    result: Option<LastRunResult>,
}

#[derive(Debug, Deserialize)]
struct LastRunResult {
    #[serde(default)]
    line: Option<f64>,
    #[serde(default)]
    branch: Option<f64>,
}

/// Parse a `.last_run.json` file, `None` when absent or malformed
pub fn parse_last_run(path: &Path) -> Option<LastRunSummary> {
    let content = read_content(path)?;

    match parse_last_run_string(&content) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!("Failed to parse {}: {:#}", path.display(), e);
            None
        }
    }
}

/// Parse `{ "result": { "line": 93.2, "branch": 80.0 } }`.
///
/// A document without a `result` object yields `Ok(None)`.
pub fn parse_last_run_string(content: &str) -> Result<Option<LastRunSummary>> {
    let data: LastRunFile = serde_json::from_str(content).context("Invalid .last_run.json")?;

    Ok(data.result.map(|result| LastRunSummary {
        line: result.line.unwrap_or(0.0),
        branch: result.branch.unwrap_or(0.0),
    }))
}

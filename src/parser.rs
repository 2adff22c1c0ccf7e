//! Decoding of GitHub Actions REST response bodies for [`CiClient`](crate::traits::CiClient)
//! implementations, plus the cached rate-limit quota they report.

use crate::model::{Job, Run, Workflow};
use color_eyre::eyre::{eyre, Result};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10 MB

/// Quota assumed before the first response arrives (authenticated REST limit).
pub const DEFAULT_RATE_LIMIT: u32 = 5000;

fn check_response_size(json: &str) -> Result<()> {
    if json.len() > MAX_RESPONSE_SIZE {
        return Err(eyre!(
            "Response too large ({:.1} MB, max {} MB)",
            json.len() as f64 / (1024.0 * 1024.0),
            MAX_RESPONSE_SIZE / (1024 * 1024)
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
struct WorkflowsResponse {
    workflows: Vec<Workflow>,
}

#[derive(Deserialize)]
struct RunsResponse {
    workflow_runs: Vec<Run>,
}

#[derive(Deserialize)]
struct JobsResponse {
    jobs: Vec<Job>,
}

/// `GET /repos/{owner}/{repo}/actions/workflows`
pub fn parse_workflows(json: &str) -> Result<Vec<Workflow>> {
    check_response_size(json)?;
    let resp: WorkflowsResponse = serde_json::from_str(json)?;
    Ok(resp.workflows)
}

/// `GET /repos/{owner}/{repo}/actions/workflows/{id}/runs`
pub fn parse_runs(json: &str) -> Result<Vec<Run>> {
    check_response_size(json)?;
    let resp: RunsResponse = serde_json::from_str(json)?;
    Ok(resp.workflow_runs)
}

/// `GET /repos/{owner}/{repo}/actions/runs/{id}/jobs`
pub fn parse_jobs(json: &str) -> Result<Vec<Job>> {
    check_response_size(json)?;
    let resp: JobsResponse = serde_json::from_str(json)?;
    Ok(resp.jobs)
}

/// Last `X-RateLimit-Remaining` value seen, readable from any thread without
/// blocking.
#[derive(Debug)]
pub struct RateLimitCache(AtomicU32);

impl Default for RateLimitCache {
    fn default() -> Self {
        Self(AtomicU32::new(DEFAULT_RATE_LIMIT))
    }
}

impl RateLimitCache {
    pub fn remaining(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Records a header value. Unparseable values are ignored.
    pub fn update_from_header(&self, value: &str) {
        match value.trim().parse::<u32>() {
            Ok(n) => self.0.store(n, Ordering::Relaxed),
            Err(_) => tracing::debug!(value, "ignoring malformed rate limit header"),
        }
    }
}

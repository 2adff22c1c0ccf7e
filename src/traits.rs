use crate::model::{Job, Run, Workflow};
use async_trait::async_trait;
use color_eyre::eyre::Result;

/// Transport to the CI provider. Implementations own authentication,
/// pagination and request timeouts.
#[async_trait]
pub trait CiClient: Send + Sync {
    async fn fetch_workflows(&self) -> Result<Vec<Workflow>>;
    async fn fetch_runs(&self, workflow_id: u64) -> Result<Vec<Run>>;
    async fn fetch_jobs(&self, run_id: u64) -> Result<Vec<Job>>;
    async fn fetch_job_logs(&self, job_id: u64) -> Result<String>;
    async fn cancel_run(&self, run_id: u64) -> Result<()>;
    async fn rerun_run(&self, run_id: u64) -> Result<()>;
    async fn rerun_failed_jobs(&self, run_id: u64) -> Result<()>;
    /// `workflow_file` is the file name under `.github/workflows/`.
    async fn dispatch_workflow(&self, workflow_file: &str, git_ref: &str) -> Result<()>;
    async fn copy_to_clipboard(&self, text: &str) -> Result<()>;
    /// Cached quota from the last response headers. Must not hit the network.
    fn rate_limit_remaining(&self) -> u32;
}

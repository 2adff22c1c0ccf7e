//! The state actor and its command executor.
//!
//! [`Runtime::run`] owns the [`AppState`] for the lifetime of the loop and
//! applies one [`AppEvent`] at a time. Commands coming back from the state are
//! run as monitored tokio tasks whose results re-enter the same channel, so
//! nothing outside the loop ever touches the state.

use crate::app::{AppState, LogSequence};
use crate::events::{AppEvent, Command, Intent, RunAction};
use crate::poller::{AdaptivePoller, BackgroundTicker};
use crate::traits::CiClient;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;

/// Panic message of a failed task, or `None` if it was cancelled.
fn panic_message(join_err: JoinError) -> Option<String> {
    let payload = join_err.try_into_panic().ok()?;
    let msg = match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&str>() {
            Ok(s) => s.to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    };
    Some(msg)
}

/// Runs `fut` on its own task and reports a panic as a global error.
/// Cancellation is only logged.
pub fn spawn_monitored(
    tx: mpsc::UnboundedSender<AppEvent>,
    label: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) {
    tokio::spawn(async move {
        let handle = tokio::spawn(fut);
        let Err(join_err) = handle.await else {
            return;
        };
        let Some(msg) = panic_message(join_err) else {
            tracing::warn!("{label}: task cancelled");
            return;
        };
        tracing::error!("{label} panicked: {msg}");
        if tx
            .send(AppEvent::Error(format!("{label} crashed: {msg}")))
            .is_err()
        {
            tracing::warn!("{label}: channel closed while reporting panic");
        }
    });
}

fn send(tx: &mpsc::UnboundedSender<AppEvent>, label: &str, event: AppEvent) {
    if tx.send(event).is_err() {
        tracing::warn!("{label}: channel closed");
    }
}

pub struct Runtime {
    client: Arc<dyn CiClient>,
    tx: mpsc::UnboundedSender<AppEvent>,
    poller: AdaptivePoller,
    ticker: BackgroundTicker,
    log_seq: LogSequence,
    /// Job selected after the last processed event. Read by the ticker
    /// callback to skip fetches for a job that is no longer on screen.
    selected_tx: watch::Sender<Option<u64>>,
}

impl Runtime {
    /// `log_seq` must come from the [`AppState`] later passed to [`run`](Self::run).
    pub fn new(
        client: Arc<dyn CiClient>,
        tx: mpsc::UnboundedSender<AppEvent>,
        poller: AdaptivePoller,
        log_seq: LogSequence,
    ) -> Self {
        let (selected_tx, _) = watch::channel(None);
        Self {
            client,
            tx,
            poller,
            ticker: BackgroundTicker::new(),
            log_seq,
            selected_tx,
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    /// Drains `rx` until the state asks to quit or every sender is gone,
    /// calling `on_update` after each event so a front end can redraw.
    /// Starts by loading workflows.
    pub async fn run<F>(
        mut self,
        mut state: AppState,
        mut rx: mpsc::UnboundedReceiver<AppEvent>,
        mut on_update: F,
    ) -> AppState
    where
        F: FnMut(&AppState),
    {
        for command in state.update(AppEvent::Intent(Intent::Refresh)) {
            self.execute(command);
        }
        on_update(&state);

        while let Some(event) = rx.recv().await {
            let commands = state.update(event);
            self.selected_tx.send_replace(state.selected_job_id());
            for command in commands {
                self.execute(command);
            }
            state.prune_error();
            state.prune_flash();
            on_update(&state);
            if state.should_quit {
                break;
            }
        }
        self.ticker.stop();
        state
    }

    pub fn execute(&mut self, command: Command) {
        tracing::debug!(?command, "execute");
        match command {
            Command::FetchWorkflows => {
                let client = self.client.clone();
                let tx = self.tx.clone();
                spawn_monitored(self.tx.clone(), "fetch_workflows", async move {
                    let result = client.fetch_workflows().await.map_err(|e| format!("{e}"));
                    send(&tx, "fetch_workflows", AppEvent::WorkflowsLoaded(result));
                });
            }
            Command::FetchRuns { workflow_id } => {
                let client = self.client.clone();
                let tx = self.tx.clone();
                spawn_monitored(self.tx.clone(), "fetch_runs", async move {
                    let result = client
                        .fetch_runs(workflow_id)
                        .await
                        .map_err(|e| format!("{e}"));
                    send(&tx, "fetch_runs", AppEvent::RunsLoaded { workflow_id, result });
                });
            }
            Command::FetchJobs { run_id } => {
                let client = self.client.clone();
                let tx = self.tx.clone();
                spawn_monitored(self.tx.clone(), "fetch_jobs", async move {
                    let result = client.fetch_jobs(run_id).await.map_err(|e| format!("{e}"));
                    send(&tx, "fetch_jobs", AppEvent::JobsLoaded { run_id, result });
                });
            }
            Command::FetchLogs { job_id, seq } => {
                let client = self.client.clone();
                let tx = self.tx.clone();
                spawn_monitored(self.tx.clone(), "fetch_logs", async move {
                    let result = client
                        .fetch_job_logs(job_id)
                        .await
                        .map_err(|e| format!("{e}"));
                    send(&tx, "fetch_logs", AppEvent::LogsLoaded { job_id, seq, result });
                });
            }
            Command::StartLogPolling { job_id } => self.start_polling(job_id),
            Command::StopLogPolling => self.ticker.stop(),
            Command::RunAction(action) => {
                let client = self.client.clone();
                let tx = self.tx.clone();
                spawn_monitored(self.tx.clone(), "run_action", async move {
                    let result = match &action {
                        RunAction::Cancel { run_id } => client.cancel_run(*run_id).await,
                        RunAction::Rerun { run_id } => client.rerun_run(*run_id).await,
                        RunAction::RerunFailedJobs { run_id } => {
                            client.rerun_failed_jobs(*run_id).await
                        }
                        RunAction::Dispatch {
                            workflow_file,
                            git_ref,
                        } => client.dispatch_workflow(workflow_file, git_ref).await,
                    }
                    .map_err(|e| format!("{e}"));
                    send(&tx, "run_action", AppEvent::RunActionDone { action, result });
                });
            }
            Command::CopyToClipboard { text } => {
                let client = self.client.clone();
                let tx = self.tx.clone();
                spawn_monitored(self.tx.clone(), "clipboard", async move {
                    let result = client.copy_to_clipboard(&text).await.map_err(|e| format!("{e}"));
                    send(&tx, "clipboard", AppEvent::ClipboardResult { text, result });
                });
            }
        }
    }

    fn start_polling(&mut self, job_id: u64) {
        let quota_client = self.client.clone();
        let client = self.client.clone();
        let selected_rx = self.selected_tx.subscribe();
        let log_seq = self.log_seq.clone();
        self.ticker.start(
            self.poller,
            move || quota_client.rate_limit_remaining(),
            self.tx.clone(),
            move || {
                let client = client.clone();
                let selected = *selected_rx.borrow();
                let log_seq = log_seq.clone();
                async move {
                    if selected != Some(job_id) {
                        tracing::debug!(job_id, "log poll skipped: job no longer selected");
                        return None;
                    }
                    let seq = log_seq.allocate();
                    let result = client
                        .fetch_job_logs(job_id)
                        .await
                        .map_err(|e| format!("{e}"));
                    Some(AppEvent::LogsLoaded {
                        job_id,
                        seq,
                        result,
                    })
                }
            },
        );
    }
}

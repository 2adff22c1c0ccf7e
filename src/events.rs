//! Messages entering the state actor and commands leaving it.
//!
//! Everything that mutates [`AppState`](crate::app::AppState) arrives as an
//! [`AppEvent`] on one unbounded channel: fetch results from spawned tasks,
//! ticker results, and operator intents from the input layer. The state answers
//! each event with [`Command`]s that the runtime executes outside the actor.

use crate::model::{Job, Run, Workflow};

#[derive(Debug)]
pub enum AppEvent {
    WorkflowsLoaded(Result<Vec<Workflow>, String>),
    /// Tagged with the workflow the runs were requested for; dropped if that
    /// workflow is no longer selected.
    RunsLoaded {
        workflow_id: u64,
        result: Result<Vec<Run>, String>,
    },
    JobsLoaded {
        run_id: u64,
        result: Result<Vec<Job>, String>,
    },
    LogsLoaded {
        job_id: u64,
        /// Issue order of the fetch, see [`LogSequence`](crate::app::LogSequence).
        seq: u64,
        result: Result<String, String>,
    },
    /// Outcome of a [`RunAction`]. Success flashes a message and refreshes
    /// the selected workflow's runs.
    RunActionDone {
        action: RunAction,
        result: Result<(), String>,
    },
    /// A failed copy still flashes `text` so it can be copied by hand.
    ClipboardResult {
        text: String,
        result: Result<(), String>,
    },
    Intent(Intent),
    /// Global banner, auto-dismissed after `ERROR_TTL_SECS`.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Workflows,
    Runs,
    Jobs,
}

impl Pane {
    pub fn next(self) -> Self {
        match self {
            Pane::Workflows => Pane::Runs,
            Pane::Runs => Pane::Jobs,
            Pane::Jobs => Pane::Workflows,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Pane::Workflows => Pane::Jobs,
            Pane::Runs => Pane::Workflows,
            Pane::Jobs => Pane::Runs,
        }
    }
}

/// One mutating entry point per operator action. Filter and movement intents
/// apply to the focused pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SetFilter(String),
    MoveSelection(Direction),
    /// Pointer selection of a row in the filtered view of `pane`.
    SelectIndex { pane: Pane, index: usize },
    FocusPane(Pane),
    FocusNext,
    FocusPrev,
    /// `None` is the aggregate "All logs" view.
    SelectStep(Option<usize>),
    StepNext,
    StepPrev,
    StartLogPolling,
    StopLogPolling,
    Refresh,
    /// Re-fetch runs of the selected workflow only.
    RefreshWorkflow,
    /// Asks for confirmation first; see [`ConfirmYes`](Intent::ConfirmYes).
    CancelRun,
    RerunRun,
    RerunFailedJobs,
    /// Dispatch the selected workflow on the default branch.
    TriggerWorkflow,
    CopyRunUrl,
    ConfirmYes,
    ConfirmNo,
    DismissError,
    Quit,
}

/// Mutating operations on a run or workflow, executed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunAction {
    Cancel { run_id: u64 },
    Rerun { run_id: u64 },
    RerunFailedJobs { run_id: u64 },
    Dispatch { workflow_file: String, git_ref: String },
}

impl RunAction {
    pub fn success_message(&self) -> String {
        match self {
            RunAction::Cancel { .. } => "Run cancelled".to_string(),
            RunAction::Rerun { .. } => "Rerun triggered".to_string(),
            RunAction::RerunFailedJobs { .. } => "Rerun failed jobs triggered".to_string(),
            RunAction::Dispatch { workflow_file, .. } => {
                format!("Workflow triggered: {workflow_file}")
            }
        }
    }

    pub fn failure_message(&self, error: &str) -> String {
        let what = match self {
            RunAction::Cancel { .. } => "cancel run",
            RunAction::Rerun { .. } => "rerun workflow",
            RunAction::RerunFailedJobs { .. } => "rerun failed jobs",
            RunAction::Dispatch { .. } => "trigger workflow",
        };
        format!("Failed to {what}: {error}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchWorkflows,
    FetchRuns { workflow_id: u64 },
    FetchJobs { run_id: u64 },
    FetchLogs { job_id: u64, seq: u64 },
    StartLogPolling { job_id: u64 },
    StopLogPolling,
    RunAction(RunAction),
    CopyToClipboard { text: String },
}

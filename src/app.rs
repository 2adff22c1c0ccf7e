//! Selection cascade: workflows → runs → jobs → logs.
//!
//! [`AppState`] is owned by a single actor and mutated only through
//! [`AppState::update`], which answers every event with the side effects to
//! run next. Fetch results are tagged with the parent they were requested for
//! and dropped when that parent is no longer selected, so downstream panes keep
//! their old contents until the matching fetch resolves.

use crate::events::{AppEvent, Command, Direction, Intent, Pane, RunAction};
use crate::filtered_list::{contains_ignore_case, FilteredList};
use crate::logs::{parse_logs, ParsedLogs};
use crate::model::{Job, Run, Step, Workflow};
use ratatui::text::Line;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Long enough to read; short enough to not permanently obscure the panes.
pub const ERROR_TTL_SECS: u64 = 10;

pub const LOADING_LOGS_MESSAGE: &str = "Loading logs...";
pub const NO_LOGS_MESSAGE: &str = "No logs available";
pub const FAILED_LOGS_MESSAGE: &str = "Failed to load logs";
pub const WAITING_LOGS_MESSAGE: &str = "Waiting for job to complete...";
/// Label of the aggregate entry above the step list.
pub const ALL_LOGS_LABEL: &str = "All logs";

pub const FLASH_TTL_SECS: u64 = 5;
/// Branch a workflow dispatch runs on.
pub const DEFAULT_DISPATCH_REF: &str = "main";
const WORKFLOWS_DIR: &str = ".github/workflows/";

/// Issue order of log fetches, shared between the actor and the poll ticker.
#[derive(Debug, Clone, Default)]
pub struct LogSequence(Arc<AtomicU64>);

impl LogSequence {
    pub fn allocate(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    /// The number the next call to [`allocate`](Self::allocate) will hand out.
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Which jobs get their logs fetched as soon as they become selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFetch {
    /// Operator navigation: any job that has started.
    Started,
    /// A job list arriving: completed jobs only.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    CancelRun(u64),
}

/// A pending yes/no question. While one is open, only
/// [`Intent::ConfirmYes`], [`Intent::ConfirmNo`], [`Intent::DismissError`]
/// and [`Intent::Quit`] are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirm {
    pub message: String,
    pub action: ConfirmAction,
}

/// What the log pane shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LogPane {
    /// No job selected.
    #[default]
    Empty,
    Placeholder(String),
    Rendered(Vec<Line<'static>>),
}

/// One row of the step list: a parsed log group paired by index with the
/// provider's step, when the provider reported that many.
#[derive(Debug, Clone, PartialEq)]
pub struct StepEntry<'a> {
    pub name: &'a str,
    pub step: Option<&'a Step>,
    pub errors: usize,
    pub warnings: usize,
}

fn workflow_matches(workflow: &Workflow, filter: &str) -> bool {
    contains_ignore_case(&workflow.name, filter)
}

fn run_matches(run: &Run, filter: &str) -> bool {
    contains_ignore_case(&run.branch, filter) || contains_ignore_case(&run.actor, filter)
}

fn job_matches(job: &Job, filter: &str) -> bool {
    contains_ignore_case(&job.name, filter)
}

pub struct AppState {
    workflows: FilteredList<Workflow>,
    runs: FilteredList<Run>,
    jobs: FilteredList<Job>,
    focus: Pane,

    // Log pane
    parsed_logs: Option<ParsedLogs>,
    selected_step: Option<usize>,
    log_pane: LogPane,
    log_seq: LogSequence,
    /// Lowest sequence number still accepted for the selected job.
    log_seq_floor: u64,
    /// Job the background ticker is bound to.
    polling: Option<u64>,

    confirm: Option<Confirm>,

    // Transient UI
    pub error: Option<(String, Instant)>,
    pub flash: Option<(String, Instant)>,
    pub loading_count: u16,
    pub should_quit: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workflows: FilteredList::new(workflow_matches),
            runs: FilteredList::new(run_matches),
            jobs: FilteredList::new(job_matches),
            focus: Pane::default(),
            parsed_logs: None,
            selected_step: None,
            log_pane: LogPane::Empty,
            log_seq: LogSequence::default(),
            log_seq_floor: 0,
            polling: None,
            confirm: None,
            error: None,
            flash: None,
            loading_count: 0,
            should_quit: false,
        }
    }

    /// Shared with the runtime so ticker fetches draw from the same sequence.
    pub fn log_sequence(&self) -> LogSequence {
        self.log_seq.clone()
    }

    pub fn update(&mut self, event: AppEvent) -> Vec<Command> {
        match event {
            AppEvent::WorkflowsLoaded(result) => self.on_workflows_loaded(result),
            AppEvent::RunsLoaded {
                workflow_id,
                result,
            } => self.on_runs_loaded(workflow_id, result),
            AppEvent::JobsLoaded { run_id, result } => self.on_jobs_loaded(run_id, result),
            AppEvent::LogsLoaded {
                job_id,
                seq,
                result,
            } => {
                self.on_logs_loaded(job_id, seq, result);
                Vec::new()
            }
            AppEvent::RunActionDone { action, result } => match result {
                Ok(()) => {
                    self.set_flash(action.success_message());
                    self.refresh_current_workflow()
                }
                Err(e) => {
                    self.set_error(action.failure_message(&e));
                    Vec::new()
                }
            },
            AppEvent::ClipboardResult { text, result } => {
                match result {
                    Ok(()) => self.set_flash(format!("Copied: {text}")),
                    Err(e) => {
                        tracing::debug!(error = %e, "clipboard unavailable");
                        self.set_flash(format!("URL: {text}"));
                    }
                }
                Vec::new()
            }
            AppEvent::Intent(intent) => self.apply_intent(intent),
            AppEvent::Error(msg) => {
                self.set_error(msg);
                Vec::new()
            }
        }
    }

    fn on_workflows_loaded(&mut self, result: Result<Vec<Workflow>, String>) -> Vec<Command> {
        self.end_loading();
        match result {
            Ok(workflows) => {
                self.workflows.set_items(workflows);
                if self.workflows.is_empty() {
                    self.runs.set_items(Vec::new());
                    self.jobs.set_items(Vec::new());
                    self.job_selection_changed(LogFetch::Completed)
                } else {
                    self.selection_changed(Pane::Workflows)
                }
            }
            Err(e) => {
                self.set_error(format!("Failed to load workflows: {e}"));
                Vec::new()
            }
        }
    }

    fn on_runs_loaded(&mut self, workflow_id: u64, result: Result<Vec<Run>, String>) -> Vec<Command> {
        self.end_loading();
        if self.selected_workflow().map(|w| w.id) != Some(workflow_id) {
            tracing::debug!(workflow_id, "discarding runs: workflow no longer selected");
            return Vec::new();
        }
        match result {
            Ok(runs) => {
                self.runs.set_items(runs);
                if self.runs.is_empty() {
                    self.jobs.set_items(Vec::new());
                    self.job_selection_changed(LogFetch::Completed)
                } else {
                    self.selection_changed(Pane::Runs)
                }
            }
            Err(e) => {
                self.set_error(format!("Failed to load runs: {e}"));
                Vec::new()
            }
        }
    }

    fn on_jobs_loaded(&mut self, run_id: u64, result: Result<Vec<Job>, String>) -> Vec<Command> {
        self.end_loading();
        if self.selected_run().map(|r| r.id) != Some(run_id) {
            tracing::debug!(run_id, "discarding jobs: run no longer selected");
            return Vec::new();
        }
        let jobs = match result {
            Ok(jobs) => jobs,
            Err(e) => {
                self.set_error(format!("Failed to load jobs: {e}"));
                return Vec::new();
            }
        };

        let previous = self.selected_job_id();
        self.jobs.set_items(jobs);
        let Some(job) = self.jobs.selected() else {
            return self.job_selection_changed(LogFetch::Completed);
        };
        if previous != Some(job.id) {
            return self.job_selection_changed(LogFetch::Completed);
        }

        // Same job still selected: its status may have moved on.
        let job_id = job.id;
        let started = job.status.has_started();
        let completed = job.is_completed();
        let status_message = job.status_message();

        let mut commands = Vec::new();
        let poll_ended = self.polling == Some(job_id) && !(started && !completed);
        if poll_ended {
            self.polling = None;
            commands.push(Command::StopLogPolling);
        }
        // A running job keeps the logs polled so far.
        if completed && (poll_ended || self.parsed_logs.is_none()) {
            if self.parsed_logs.is_none() {
                self.log_pane = LogPane::Placeholder(LOADING_LOGS_MESSAGE.to_string());
            }
            commands.push(self.fetch_logs(job_id));
        } else if !completed && (!started || self.parsed_logs.is_none()) {
            self.parsed_logs = None;
            self.selected_step = None;
            self.log_pane = LogPane::Placeholder(status_message);
        }
        commands
    }

    fn on_logs_loaded(&mut self, job_id: u64, seq: u64, result: Result<String, String>) {
        let Some(job) = self.jobs.selected() else {
            tracing::debug!(job_id, "discarding logs: no job selected");
            return;
        };
        if job.id != job_id {
            tracing::debug!(job_id, selected = job.id, "discarding logs for unselected job");
            return;
        }
        let completed = job.is_completed();
        if seq < self.log_seq_floor {
            tracing::debug!(job_id, seq, floor = self.log_seq_floor, "discarding superseded logs");
            return;
        }
        self.log_seq_floor = seq + 1;

        match result {
            Ok(raw) => {
                let parsed = parse_logs(&raw);
                self.selected_step = clamp_step(self.selected_step, parsed.steps.len());
                self.parsed_logs = Some(parsed);
                self.refresh_log_pane();
            }
            Err(e) => {
                // Never surfaced in the banner; the pane placeholder is enough.
                tracing::debug!(job_id, error = %e, "log fetch failed");
                let message = if completed {
                    FAILED_LOGS_MESSAGE
                } else {
                    WAITING_LOGS_MESSAGE
                };
                self.parsed_logs = None;
                self.log_pane = LogPane::Placeholder(message.to_string());
            }
        }
    }

    fn apply_intent(&mut self, intent: Intent) -> Vec<Command> {
        if self.confirm.is_some()
            && !matches!(
                intent,
                Intent::ConfirmYes | Intent::ConfirmNo | Intent::DismissError | Intent::Quit
            )
        {
            tracing::debug!(?intent, "ignored while a confirmation is open");
            return Vec::new();
        }
        match intent {
            Intent::SetFilter(text) => {
                let pane = self.focus;
                let before = self.selected_id(pane);
                match pane {
                    Pane::Workflows => self.workflows.set_filter(&text),
                    Pane::Runs => self.runs.set_filter(&text),
                    Pane::Jobs => self.jobs.set_filter(&text),
                }
                if self.selected_id(pane) == before {
                    Vec::new()
                } else {
                    self.selection_changed(pane)
                }
            }
            Intent::MoveSelection(direction) => {
                let pane = self.focus;
                let moved = match (pane, direction) {
                    (Pane::Workflows, Direction::Up) => self.workflows.select_prev(),
                    (Pane::Workflows, Direction::Down) => self.workflows.select_next(),
                    (Pane::Runs, Direction::Up) => self.runs.select_prev(),
                    (Pane::Runs, Direction::Down) => self.runs.select_next(),
                    (Pane::Jobs, Direction::Up) => self.jobs.select_prev(),
                    (Pane::Jobs, Direction::Down) => self.jobs.select_next(),
                };
                if moved {
                    self.selection_changed(pane)
                } else {
                    Vec::new()
                }
            }
            Intent::SelectIndex { pane, index } => {
                self.focus = pane;
                let moved = match pane {
                    Pane::Workflows => self.workflows.select(index),
                    Pane::Runs => self.runs.select(index),
                    Pane::Jobs => self.jobs.select(index),
                };
                if moved {
                    self.selection_changed(pane)
                } else {
                    Vec::new()
                }
            }
            Intent::FocusPane(pane) => {
                self.focus = pane;
                Vec::new()
            }
            Intent::FocusNext => {
                self.focus = self.focus.next();
                Vec::new()
            }
            Intent::FocusPrev => {
                self.focus = self.focus.prev();
                Vec::new()
            }
            Intent::SelectStep(step) => {
                self.select_step(step);
                Vec::new()
            }
            Intent::StepNext => {
                let count = self.step_count();
                let next = match self.selected_step {
                    None => 0,
                    Some(i) => i + 1,
                };
                if next < count {
                    self.select_step(Some(next));
                }
                Vec::new()
            }
            Intent::StepPrev => {
                match self.selected_step {
                    Some(0) => self.select_step(None),
                    Some(i) => self.select_step(Some(i - 1)),
                    None => {}
                }
                Vec::new()
            }
            Intent::StartLogPolling => self.start_polling(),
            Intent::StopLogPolling => self.stop_polling(),
            Intent::Refresh => {
                self.begin_loading();
                vec![Command::FetchWorkflows]
            }
            Intent::RefreshWorkflow => self.refresh_current_workflow(),
            Intent::CancelRun => {
                let Some(run) = self.runs.selected() else {
                    return Vec::new();
                };
                if !run.is_running() {
                    self.set_error("Cannot cancel: run is not in progress".to_string());
                    return Vec::new();
                }
                self.confirm = Some(Confirm {
                    message: format!("Cancel \"{} #{}\"?", run.name, run.run_number),
                    action: ConfirmAction::CancelRun(run.id),
                });
                Vec::new()
            }
            Intent::RerunRun => match self.runs.selected() {
                Some(run) => vec![Command::RunAction(RunAction::Rerun { run_id: run.id })],
                None => Vec::new(),
            },
            Intent::RerunFailedJobs => {
                let Some(run) = self.runs.selected() else {
                    return Vec::new();
                };
                if !run.is_failed() {
                    self.set_error("Nothing to rerun: run did not fail".to_string());
                    return Vec::new();
                }
                vec![Command::RunAction(RunAction::RerunFailedJobs { run_id: run.id })]
            }
            Intent::TriggerWorkflow => match self.workflows.selected() {
                Some(workflow) => {
                    let workflow_file = workflow
                        .path
                        .strip_prefix(WORKFLOWS_DIR)
                        .unwrap_or(&workflow.path)
                        .to_string();
                    vec![Command::RunAction(RunAction::Dispatch {
                        workflow_file,
                        git_ref: DEFAULT_DISPATCH_REF.to_string(),
                    })]
                }
                None => Vec::new(),
            },
            Intent::CopyRunUrl => match self.runs.selected() {
                Some(run) if !run.url.is_empty() => vec![Command::CopyToClipboard {
                    text: run.url.clone(),
                }],
                _ => Vec::new(),
            },
            Intent::ConfirmYes => match self.confirm.take() {
                Some(Confirm {
                    action: ConfirmAction::CancelRun(run_id),
                    ..
                }) => vec![Command::RunAction(RunAction::Cancel { run_id })],
                None => Vec::new(),
            },
            Intent::ConfirmNo => {
                self.confirm = None;
                Vec::new()
            }
            Intent::DismissError => {
                self.clear_error();
                Vec::new()
            }
            Intent::Quit => {
                self.should_quit = true;
                self.stop_polling()
            }
        }
    }

    fn selected_id(&self, pane: Pane) -> Option<u64> {
        match pane {
            Pane::Workflows => self.selected_workflow().map(|w| w.id),
            Pane::Runs => self.selected_run().map(|r| r.id),
            Pane::Jobs => self.selected_job_id(),
        }
    }

    /// Fetch the next stage for a new selection in `pane`. Downstream panes
    /// are left alone until that fetch resolves.
    fn selection_changed(&mut self, pane: Pane) -> Vec<Command> {
        match pane {
            Pane::Workflows => match self.selected_workflow() {
                Some(w) => {
                    let workflow_id = w.id;
                    self.begin_loading();
                    vec![Command::FetchRuns { workflow_id }]
                }
                None => Vec::new(),
            },
            Pane::Runs => match self.selected_run() {
                Some(r) => {
                    let run_id = r.id;
                    self.begin_loading();
                    vec![Command::FetchJobs { run_id }]
                }
                None => Vec::new(),
            },
            Pane::Jobs => self.job_selection_changed(LogFetch::Started),
        }
    }

    /// Logs belong to exactly one job, so they are cleared eagerly here rather
    /// than when the next fetch lands. Polling follows the selection only to
    /// jobs that are running.
    fn job_selection_changed(&mut self, fetch: LogFetch) -> Vec<Command> {
        self.parsed_logs = None;
        self.selected_step = None;
        // Anything issued so far was for another job.
        self.log_seq_floor = self.log_seq.peek();

        let Some(job) = self.jobs.selected() else {
            self.log_pane = LogPane::Empty;
            return self.stop_polling();
        };
        let job_id = job.id;
        let started = job.status.has_started();
        let finished = job.is_completed();
        let status_message = job.status_message();

        let mut commands = Vec::new();
        if let Some(bound) = self.polling {
            if !started || finished {
                self.polling = None;
                commands.push(Command::StopLogPolling);
            } else if bound != job_id {
                self.polling = Some(job_id);
                commands.push(Command::StartLogPolling { job_id });
            }
        }
        let fetch_now = match fetch {
            LogFetch::Started => started,
            LogFetch::Completed => finished,
        };
        if fetch_now {
            self.log_pane = LogPane::Placeholder(LOADING_LOGS_MESSAGE.to_string());
            commands.push(self.fetch_logs(job_id));
        } else {
            self.log_pane = LogPane::Placeholder(status_message);
        }
        commands
    }

    fn refresh_current_workflow(&mut self) -> Vec<Command> {
        let Some(workflow_id) = self.selected_workflow().map(|w| w.id) else {
            return Vec::new();
        };
        self.begin_loading();
        vec![Command::FetchRuns { workflow_id }]
    }

    fn fetch_logs(&self, job_id: u64) -> Command {
        Command::FetchLogs {
            job_id,
            seq: self.log_seq.allocate(),
        }
    }

    fn start_polling(&mut self) -> Vec<Command> {
        let Some(job) = self.jobs.selected() else {
            return Vec::new();
        };
        if !job.status.has_started() || job.is_completed() {
            tracing::debug!(
                job_id = job.id,
                status = job.status.as_str(),
                "not polling a job that is not running"
            );
            return Vec::new();
        }
        let job_id = job.id;
        self.polling = Some(job_id);
        vec![Command::StartLogPolling { job_id }]
    }

    fn stop_polling(&mut self) -> Vec<Command> {
        match self.polling.take() {
            Some(_) => vec![Command::StopLogPolling],
            None => Vec::new(),
        }
    }

    fn step_count(&self) -> usize {
        self.parsed_logs.as_ref().map_or(0, |p| p.steps.len())
    }

    fn select_step(&mut self, step: Option<usize>) {
        self.selected_step = clamp_step(step, self.step_count());
        self.refresh_log_pane();
    }

    fn refresh_log_pane(&mut self) {
        let Some(parsed) = &self.parsed_logs else {
            return;
        };
        let lines = parsed.format_step_logs(self.selected_step);
        self.log_pane = if lines.is_empty() {
            LogPane::Placeholder(NO_LOGS_MESSAGE.to_string())
        } else {
            LogPane::Rendered(lines)
        };
    }

    // ── Read-only accessors for the rendering layer ──

    pub fn workflows(&self) -> &FilteredList<Workflow> {
        &self.workflows
    }

    pub fn runs(&self) -> &FilteredList<Run> {
        &self.runs
    }

    pub fn jobs(&self) -> &FilteredList<Job> {
        &self.jobs
    }

    pub fn selected_workflow(&self) -> Option<&Workflow> {
        self.workflows.selected()
    }

    pub fn selected_run(&self) -> Option<&Run> {
        self.runs.selected()
    }

    pub fn selected_job(&self) -> Option<&Job> {
        self.jobs.selected()
    }

    pub fn selected_job_id(&self) -> Option<u64> {
        self.jobs.selected().map(|j| j.id)
    }

    pub fn focus(&self) -> Pane {
        self.focus
    }

    pub fn parsed_logs(&self) -> Option<&ParsedLogs> {
        self.parsed_logs.as_ref()
    }

    /// `None` is the aggregate view.
    pub fn selected_step(&self) -> Option<usize> {
        self.selected_step
    }

    pub fn log_pane(&self) -> &LogPane {
        &self.log_pane
    }

    pub fn step_entries(&self) -> Vec<StepEntry<'_>> {
        let Some(parsed) = &self.parsed_logs else {
            return Vec::new();
        };
        let provider_steps = self.jobs.selected().map_or(&[][..], |j| &j.steps[..]);
        parsed
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| StepEntry {
                name: &s.name,
                step: provider_steps.get(i),
                errors: parsed.error_count(i),
                warnings: parsed.warning_count(i),
            })
            .collect()
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_some()
    }

    pub fn polling_job(&self) -> Option<u64> {
        self.polling
    }

    pub fn is_loading(&self) -> bool {
        self.loading_count > 0
    }

    pub fn begin_loading(&mut self) {
        self.loading_count = self.loading_count.saturating_add(1);
    }

    pub fn end_loading(&mut self) {
        self.loading_count = self.loading_count.saturating_sub(1);
    }

    pub fn set_error(&mut self, msg: String) {
        tracing::debug!(error = %msg, "error banner");
        self.error = Some((msg, Instant::now()));
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn prune_error(&mut self) {
        if let Some((_, ts)) = &self.error {
            if ts.elapsed().as_secs() >= ERROR_TTL_SECS {
                self.error = None;
            }
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|(msg, _)| msg.as_str())
    }

    pub fn set_flash(&mut self, msg: String) {
        self.flash = Some((msg, Instant::now()));
    }

    pub fn prune_flash(&mut self) {
        if let Some((_, ts)) = &self.flash {
            if ts.elapsed().as_secs() >= FLASH_TTL_SECS {
                self.flash = None;
            }
        }
    }

    pub fn flash_message(&self) -> Option<&str> {
        self.flash.as_ref().map(|(msg, _)| msg.as_str())
    }

    pub fn confirm(&self) -> Option<&Confirm> {
        self.confirm.as_ref()
    }
}

fn clamp_step(step: Option<usize>, count: usize) -> Option<usize> {
    let last = count.checked_sub(1)?;
    step.map(|i| i.min(last))
}

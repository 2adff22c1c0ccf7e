
use fixtures::*;
use lazyci::app::{AppState, LogPane, LOADING_LOGS_MESSAGE};
use lazyci::events::{AppEvent, Command, Direction, Intent, Pane};
use lazyci::logs::{parse_logs, to_plain_text};
use lazyci::model::RunStatus;
use lazyci::parser;
use lazyci::poller::AdaptivePoller;
use lazyci::runtime::Runtime;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Runs the actor against `client` until `done` returns true, then quits.
async fn run_until<F>(client: Arc<FakeClient>, poller: AdaptivePoller, mut done: F) -> AppState
where
    F: FnMut(&AppState, &mpsc::UnboundedSender<AppEvent>) -> bool,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let state = AppState::new();
    let runtime = Runtime::new(client, tx.clone(), poller, state.log_sequence());
    let mut quitting = false;
    runtime
        .run(state, rx, move |s| {
            if !quitting && done(s, &tx) {
                quitting = true;
                tx.send(AppEvent::Intent(Intent::Quit)).unwrap();
            }
        })
        .await
}

fn last_log_line(state: &AppState) -> Option<&str> {
    state
        .parsed_logs()
        .and_then(|p| p.lines.last())
        .map(|l| l.text.as_str())
}

fn step_names(state: &AppState) -> Vec<String> {
    state
        .step_entries()
        .iter()
        .map(|e| e.name.to_string())
        .collect()
}

/// Drives a state through workflows, runs and jobs without a runtime.
fn state_with_jobs(jobs: Vec<lazyci::model::Job>) -> (AppState, Vec<Command>) {
    let mut state = AppState::new();
    state.update(AppEvent::WorkflowsLoaded(Ok(vec![workflow(1, "CI")])));
    state.update(AppEvent::RunsLoaded {
        workflow_id: 1,
        result: Ok(vec![run_with_id(10)]),
    });
    let cmds = state.update(AppEvent::JobsLoaded {
        run_id: 10,
        result: Ok(jobs),
    });
    (state, cmds)
}

// ========== Runtime (actor + executor) ==========

#[tokio::test(start_paused = true)]
async fn runtime_cascades_from_workflows_to_logs() {
    let client = Arc::new(FakeClient::with_jobs(vec![completed_job(100, "build")]));
    client.set_logs(100, TWO_STEP_LOG);

    let state = run_until(client.clone(), AdaptivePoller::default(), |s, _| {
        s.parsed_logs().is_some()
    })
    .await;

    assert_eq!(state.selected_workflow().map(|w| w.id), Some(1));
    assert_eq!(state.selected_run().map(|r| r.id), Some(10));
    assert_eq!(state.selected_job_id(), Some(100));
    assert_eq!(step_names(&state), vec!["Step 1", "Step 2"]);
    assert_eq!(client.log_fetch_count(), 1);
    assert!(!state.is_loading());
    assert!(state.should_quit);
}

#[tokio::test(start_paused = true)]
async fn runtime_never_fetches_logs_for_queued_job() {
    let client = Arc::new(FakeClient::with_jobs(vec![job_with_status(
        100,
        "build",
        RunStatus::Queued,
    )]));

    let state = run_until(client.clone(), AdaptivePoller::default(), |s, _| {
        s.selected_job_id().is_some()
    })
    .await;

    assert_eq!(client.log_fetch_count(), 0);
    assert!(state.parsed_logs().is_none());
    assert_eq!(
        state.log_pane(),
        &LogPane::Placeholder("Job is queued, waiting for a runner...".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn runtime_polls_running_job_at_base_interval() {
    let mut client = FakeClient::with_jobs(vec![job_with_status(
        100,
        "build",
        RunStatus::InProgress,
    )]);
    client.numbered_logs = true;
    let client = Arc::new(client);
    client.set_logs(100, "##[group]Build\ncompiling");

    let begin = Instant::now();
    let mut polling_requested = false;
    let state = run_until(client.clone(), AdaptivePoller::default(), move |s, tx| {
        if !polling_requested && s.selected_job_id().is_some() {
            assert_eq!(
                s.log_pane(),
                &LogPane::Placeholder("Job is running...".to_string())
            );
            polling_requested = true;
            tx.send(AppEvent::Intent(Intent::StartLogPolling)).unwrap();
        }
        last_log_line(s) == Some("fetch 2")
    })
    .await;

    // a running job is only fetched by the ticker, at 2s and 4s
    assert_eq!(client.log_fetch_count(), 2);
    let elapsed = begin.elapsed();
    assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "{elapsed:?}");
    assert!(!state.is_polling());
}

#[tokio::test(start_paused = true)]
async fn runtime_backs_off_when_quota_is_low() {
    let mut client = FakeClient::with_jobs(vec![job_with_status(
        100,
        "build",
        RunStatus::InProgress,
    )]);
    client.numbered_logs = true;
    client.rate_limit = 50.into();
    let client = Arc::new(client);
    client.set_logs(100, "##[group]Build\ncompiling");

    let begin = Instant::now();
    let mut polling_requested = false;
    run_until(client.clone(), AdaptivePoller::default(), move |s, tx| {
        if !polling_requested && s.selected_job_id().is_some() {
            polling_requested = true;
            tx.send(AppEvent::Intent(Intent::StartLogPolling)).unwrap();
        }
        last_log_line(s) == Some("fetch 1")
    })
    .await;

    let elapsed = begin.elapsed();
    assert!(elapsed >= Duration::from_secs(30), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(32), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn runtime_polling_does_not_follow_selection_to_queued_job() {
    let mut client = FakeClient::with_jobs(vec![
        job_with_status(100, "build", RunStatus::InProgress),
        job_with_status(101, "deploy", RunStatus::Queued),
    ]);
    client.numbered_logs = true;
    let client = Arc::new(client);
    client.set_logs(100, "##[group]Build\ncompiling");
    client.set_logs(101, "##[group]Deploy\nshipping");

    let mut stage = 0;
    let state = run_until(client.clone(), AdaptivePoller::default(), move |s, tx| {
        match stage {
            0 if s.selected_job_id() == Some(100) => {
                tx.send(AppEvent::Intent(Intent::StartLogPolling)).unwrap();
                stage = 1;
            }
            1 if s.is_polling() => {
                tx.send(AppEvent::Intent(Intent::SelectIndex {
                    pane: Pane::Jobs,
                    index: 1,
                }))
                .unwrap();
                stage = 2;
            }
            2 if s.selected_job_id() == Some(101) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    tx.send(AppEvent::Intent(Intent::Quit)).unwrap();
                });
                stage = 3;
            }
            _ => {}
        }
        false
    })
    .await;

    assert_eq!(client.log_fetch_count(), 0);
    assert!(!state.is_polling());
    assert_eq!(
        state.log_pane(),
        &LogPane::Placeholder("Job is queued, waiting for a runner...".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn runtime_cancels_run_after_confirmation() {
    let mut client = FakeClient::with_jobs(vec![completed_job(100, "build")]);
    client.runs.insert(1, vec![running_run(10)]);
    let client = Arc::new(client);

    let mut asked = false;
    let state = run_until(client.clone(), AdaptivePoller::default(), move |s, tx| {
        if !asked && s.selected_run().is_some() {
            asked = true;
            tx.send(AppEvent::Intent(Intent::CancelRun)).unwrap();
            tx.send(AppEvent::Intent(Intent::ConfirmYes)).unwrap();
        }
        s.flash_message().is_some()
    })
    .await;

    assert_eq!(state.flash_message(), Some("Run cancelled"));
    assert_eq!(client.recorded_actions(), vec!["cancel 10"]);
}

#[tokio::test(start_paused = true)]
async fn runtime_shows_url_when_clipboard_is_unavailable() {
    let mut client = FakeClient::with_jobs(vec![completed_job(100, "build")]);
    client.fail_clipboard = true;

    let mut asked = false;
    let state = run_until(Arc::new(client), AdaptivePoller::default(), move |s, tx| {
        if !asked && s.selected_run().is_some() {
            asked = true;
            tx.send(AppEvent::Intent(Intent::CopyRunUrl)).unwrap();
        }
        s.flash_message().is_some()
    })
    .await;

    assert_eq!(
        state.flash_message(),
        Some("URL: https://github.com/test/repo/actions/runs/10")
    );
}

#[tokio::test(start_paused = true)]
async fn runtime_reports_workflow_fetch_error() {
    let mut client = FakeClient::with_jobs(vec![]);
    client.fail_workflows = true;

    let state = run_until(Arc::new(client), AdaptivePoller::default(), |s, _| {
        s.error_message().is_some()
    })
    .await;

    assert_eq!(
        state.error_message(),
        Some("Failed to load workflows: HTTP 401: Bad credentials")
    );
    assert!(state.workflows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn runtime_reports_panicking_fetch() {
    let mut client = FakeClient::with_jobs(vec![]);
    client.panic_on_workflows = true;

    let state = run_until(Arc::new(client), AdaptivePoller::default(), |s, _| {
        s.error_message().is_some()
    })
    .await;

    assert_eq!(
        state.error_message(),
        Some("fetch_workflows crashed: transport exploded")
    );
}

#[tokio::test(start_paused = true)]
async fn runtime_missing_logs_for_completed_job_stay_local() {
    let client = Arc::new(FakeClient::with_jobs(vec![completed_job(100, "build")]));

    let state = run_until(client.clone(), AdaptivePoller::default(), |s, _| {
        matches!(s.log_pane(), LogPane::Placeholder(m) if m != LOADING_LOGS_MESSAGE)
    })
    .await;

    assert_eq!(
        state.log_pane(),
        &LogPane::Placeholder("Failed to load logs".to_string())
    );
    assert_eq!(state.error_message(), None);
}

// ========== State-level flows ==========

#[test]
fn rest_payload_to_state() {
    let json = r#"{"total_count": 2, "jobs": [
        {"id": 7, "name": "lint", "status": "queued", "conclusion": null, "steps": []},
        {"id": 8, "name": "test", "status": "completed", "conclusion": "failure",
         "steps": [{"name": "Run tests", "status": "completed", "conclusion": "failure"}]}
    ]}"#;
    let jobs = parser::parse_jobs(json).unwrap();
    let (mut state, cmds) = state_with_jobs(jobs);
    assert!(cmds.is_empty(), "queued job must not fetch logs");

    let cmds = state.update(AppEvent::Intent(Intent::SelectIndex {
        pane: Pane::Jobs,
        index: 1,
    }));
    assert_eq!(state.focus(), Pane::Jobs);
    assert!(matches!(cmds[..], [Command::FetchLogs { job_id: 8, .. }]));
}

#[test]
fn log_for_previous_job_after_switch_is_ignored() {
    let (mut state, cmds) =
        state_with_jobs(vec![completed_job(100, "build"), completed_job(101, "test")]);
    let Some(Command::FetchLogs { seq: first, .. }) = cmds.first().cloned() else {
        panic!("expected log fetch, got {cmds:?}");
    };

    state.update(AppEvent::Intent(Intent::FocusPane(Pane::Jobs)));
    let cmds = state.update(AppEvent::Intent(Intent::MoveSelection(Direction::Down)));
    let Some(Command::FetchLogs { job_id: 101, seq: second }) = cmds.first().cloned() else {
        panic!("expected log fetch for 101, got {cmds:?}");
    };

    state.update(AppEvent::LogsLoaded {
        job_id: 101,
        seq: second,
        result: Ok("##[group]Test\nok".to_string()),
    });
    state.update(AppEvent::LogsLoaded {
        job_id: 100,
        seq: first,
        result: Ok(TWO_STEP_LOG.to_string()),
    });
    assert_eq!(step_names(&state), vec!["Test"]);
}

#[test]
fn job_filter_reselects_and_fetches() {
    let (mut state, _) =
        state_with_jobs(vec![completed_job(100, "build"), completed_job(101, "unit-test")]);
    state.update(AppEvent::Intent(Intent::FocusNext));
    state.update(AppEvent::Intent(Intent::FocusNext));
    assert_eq!(state.focus(), Pane::Jobs);

    let cmds = state.update(AppEvent::Intent(Intent::SetFilter("TEST".into())));
    assert_eq!(state.selected_job_id(), Some(101));
    assert!(matches!(cmds[..], [Command::FetchLogs { job_id: 101, .. }]));

    let cmds = state.update(AppEvent::Intent(Intent::SetFilter("nothing".into())));
    assert!(cmds.is_empty());
    assert_eq!(state.log_pane(), &LogPane::Empty);
}

#[test]
fn run_filter_by_actor_keeps_jobs_until_fetch() {
    let mut state = AppState::new();
    state.update(AppEvent::WorkflowsLoaded(Ok(vec![workflow(1, "CI")])));
    state.update(AppEvent::RunsLoaded {
        workflow_id: 1,
        result: Ok(vec![
            run_on_branch(10, "main", "alice"),
            run_on_branch(11, "feature/login", "bob"),
        ]),
    });
    state.update(AppEvent::JobsLoaded {
        run_id: 10,
        result: Ok(vec![completed_job(100, "build")]),
    });
    state.update(AppEvent::Intent(Intent::FocusPane(Pane::Runs)));
    let cmds = state.update(AppEvent::Intent(Intent::SetFilter("bob".into())));
    assert_eq!(cmds, vec![Command::FetchJobs { run_id: 11 }]);
    // jobs of the old run stay until run 11's jobs arrive
    assert_eq!(state.selected_job_id(), Some(100));
}

#[test]
fn aggregate_view_equals_concatenated_steps() {
    let raw = "\
2024-01-15T10:00:00.0000000Z ##[group]Run actions/checkout@v4
2024-01-15T10:00:00.1000000Z with:
2024-01-15T10:00:00.2000000Z   fetch-depth: 1
2024-01-15T10:00:00.3000000Z ##[endgroup]
2024-01-15T10:00:01.0000000Z Syncing repository: test/repo
2024-01-15T10:00:02.0000000Z ##[group]Run cargo test
2024-01-15T10:00:02.1000000Z cargo test --all
2024-01-15T10:00:02.2000000Z ##[endgroup]
2024-01-15T10:00:09.0000000Z test result: FAILED. 1 passed; 1 failed
2024-01-15T10:00:09.1000000Z ##[error]Process completed with exit code 101.";
    let logs = parse_logs(raw);
    assert_eq!(logs.steps.len(), 2);

    let joined: Vec<String> = (0..logs.steps.len())
        .map(|i| to_plain_text(&logs.format_step_logs(Some(i))))
        .collect();
    assert_eq!(joined.join("\n"), to_plain_text(&logs.format_step_logs(None)));
    // the "FAILED" summary carries no error keyword; only the marker counts
    assert_eq!(logs.error_count(1), 1);
}

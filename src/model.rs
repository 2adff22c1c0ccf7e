//! Provider data model: workflows, runs, jobs and their provider-side steps.
//!
//! Field names follow the GitHub REST payloads so a transport can deserialize
//! responses straight into these types.

use chrono::{DateTime, Utc};
use serde::de::value::StrDeserializer;
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    InProgress,
    Queued,
    Requested,
    Waiting,
    Pending,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// A runner has picked the job up, so the provider has (partial) logs for it.
    pub fn has_started(self) -> bool {
        matches!(self, RunStatus::InProgress | RunStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::InProgress => "in_progress",
            RunStatus::Queued => "queued",
            RunStatus::Requested => "requested",
            RunStatus::Waiting => "waiting",
            RunStatus::Pending => "pending",
            RunStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    StartupFailure,
    Stale,
    Neutral,
    #[serde(other)]
    Unknown,
}

/// The REST API sends `""` for unfinished runs on some endpoints and `null` on others.
fn empty_conclusion_as_none<'de, D>(deserializer: D) -> Result<Option<Conclusion>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => {
            let de: StrDeserializer<'_, D::Error> = s.into_deserializer();
            Conclusion::deserialize(de).map(Some)
        }
    }
}

#[derive(Deserialize)]
struct Actor {
    login: String,
}

fn actor_login<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let actor: Option<Actor> = Option::deserialize(deserializer)?;
    Ok(actor.map(|a| a.login).unwrap_or_default())
}

/// A named CI pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub state: String,
}

/// One execution of a workflow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Run {
    pub id: u64,
    #[serde(default)]
    pub run_number: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "head_branch", default)]
    pub branch: String,
    #[serde(default)]
    pub event: String,
    #[serde(deserialize_with = "actor_login", default)]
    pub actor: String,
    pub status: RunStatus,
    #[serde(deserialize_with = "empty_conclusion_as_none", default)]
    pub conclusion: Option<Conclusion>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "html_url", default)]
    pub url: String,
}

impl Run {
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::InProgress
    }

    pub fn is_failed(&self) -> bool {
        self.conclusion == Some(Conclusion::Failure)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub status: RunStatus,
    #[serde(deserialize_with = "empty_conclusion_as_none", default)]
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Job {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Log pane text for a job whose logs are not (yet) fetchable.
    pub fn status_message(&self) -> String {
        match self.status {
            RunStatus::Queued => "Job is queued, waiting for a runner...".to_string(),
            RunStatus::Waiting => "Job is waiting for approval...".to_string(),
            RunStatus::Pending | RunStatus::Requested => "Job is pending...".to_string(),
            RunStatus::InProgress => "Job is running...".to_string(),
            RunStatus::Completed => "Job completed".to_string(),
            RunStatus::Unknown => format!("Job status: {}", self.status.as_str()),
        }
    }
}

/// Provider-side step as reported by the jobs API. Correlated with parsed
/// log groups by index only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Step {
    pub name: String,
    pub status: RunStatus,
    #[serde(deserialize_with = "empty_conclusion_as_none", default)]
    pub conclusion: Option<Conclusion>,
}

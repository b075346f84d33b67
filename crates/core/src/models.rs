use std::{fmt, str::FromStr};

use anyhow::{Error, bail};
use serde::{Deserialize, Deserializer, Serialize};

/// Repository identifier in `owner/name` form.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct RepoSlug {
    owner: String,
    name: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self { owner: owner.into(), name: name.into() }
    }

    pub fn owner(&self) -> &str { &self.owner }

    pub fn name(&self) -> &str { &self.name }
}

impl FromStr for RepoSlug {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((owner, name)) = s.split_once('/') else {
            bail!("Invalid repository '{s}', expected owner/name");
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("Invalid repository '{s}', expected owner/name");
        }
        Ok(Self::new(owner, name))
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Waiting => "waiting",
            Self::Requested => "requested",
            Self::Pending => "pending",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_completed(&self) -> bool { matches!(self, Self::Completed) }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A snapshot of one workflow run as returned by the Actions API.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub run_number: u64,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default, deserialize_with = "status_or_unknown")]
    pub status: RunStatus,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

// The API reports `status: null` for some runs.
fn status_or_unknown<'de, D>(deserializer: D) -> Result<RunStatus, D::Error>
where D: Deserializer<'de> {
    Ok(Option::<RunStatus>::deserialize(deserializer)?.unwrap_or_default())
}

impl WorkflowRun {
    pub fn conclusion(&self) -> &str { self.conclusion.as_deref().unwrap_or("null") }
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct WorkflowRunList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

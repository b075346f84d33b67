use anyhow::Error;
use fetch_ci_logs_core::models::{RepoSlug, WorkflowRun};

use crate::{Gateway, list_workflow_runs};

/// Number of recent runs inspected when looking for a commit.
pub const RUN_CANDIDATES: u32 = 50;

#[derive(Debug)]
pub enum RunLookup {
    Found(WorkflowRun),
    NotFound,
    Failed(Error),
}

impl RunLookup {
    pub fn into_run(self) -> Option<WorkflowRun> {
        match self {
            Self::Found(run) => Some(run),
            Self::NotFound | Self::Failed(_) => None,
        }
    }
}

/// Pick the run for `head_sha` from a newest-first list.
///
/// Falls back to the most recent run when no run matches the commit.
pub fn select_run(runs: Vec<WorkflowRun>, head_sha: &str) -> Option<WorkflowRun> {
    let index = runs
        .iter()
        .position(|run| !head_sha.is_empty() && run.head_sha == head_sha)
        .unwrap_or(0);
    runs.into_iter().nth(index)
}

pub async fn lookup_run(
    gateway: &dyn Gateway,
    repo: &RepoSlug,
    workflow: &str,
    head_sha: &str,
) -> RunLookup {
    match list_workflow_runs(gateway, repo, workflow, RUN_CANDIDATES).await {
        Ok(runs) => match select_run(runs, head_sha) {
            Some(run) => {
                if run.head_sha != head_sha {
                    tracing::debug!(
                        "No run of {} matches {}, using latest run {}",
                        workflow,
                        head_sha,
                        run.id
                    );
                }
                RunLookup::Found(run)
            }
            None => RunLookup::NotFound,
        },
        Err(e) => RunLookup::Failed(e),
    }
}

/// Like [`lookup_run`], but a failed lookup is reported as no run.
pub async fn locate_run(
    gateway: &dyn Gateway,
    repo: &RepoSlug,
    workflow: &str,
    head_sha: &str,
) -> Option<WorkflowRun> {
    match lookup_run(gateway, repo, workflow, head_sha).await {
        RunLookup::Failed(e) => {
            tracing::warn!("Error locating workflow run: {e:#}");
            None
        }
        lookup => lookup.into_run(),
    }
}

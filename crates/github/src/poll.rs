//! Bounded polling.
//!
//! A poll loop probes immediately, then sleeps exactly one interval after every
//! unsuccessful probe. The deadline is checked before each probe, so a loop with
//! timeout `T` and interval `I` probes at most `ceil(T / I)` times and returns no
//! later than one interval past its deadline.

use std::{future::Future, time::Duration};

use anyhow::{Context, Result};

use fetch_ci_logs_core::{
    config::PollPolicy,
    models::{RepoSlug, WorkflowRun},
};
use tokio::time::{Instant, sleep};

use crate::{Gateway, get_run, runs::locate_run};

pub enum Probe<T> {
    Ready(T),
    /// Not there yet, with an optional detail for the progress message.
    Pending(Option<String>),
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

pub async fn poll_until<T, F, Fut>(what: &str, policy: PollPolicy, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe<T>>,
{
    let deadline = Instant::now() + policy.timeout;
    while Instant::now() < deadline {
        match probe().await {
            Probe::Ready(value) => return Some(value),
            Probe::Pending(detail) => {
                let remaining = ceil_secs(deadline.saturating_duration_since(Instant::now()));
                match detail {
                    Some(detail) => {
                        tracing::info!("Waiting for {what}... {detail} ({remaining}s remaining)")
                    }
                    None => tracing::info!("Waiting for {what}... ({remaining}s remaining)"),
                }
            }
        }
        sleep(policy.interval).await;
    }
    None
}

/// Poll the run locator until a run shows up for the workflow.
pub async fn wait_for_run(
    gateway: &dyn Gateway,
    repo: &RepoSlug,
    workflow: &str,
    head_sha: &str,
    policy: PollPolicy,
) -> Option<WorkflowRun> {
    poll_until("workflow run", policy, move || async move {
        match locate_run(gateway, repo, workflow, head_sha).await {
            Some(run) => Probe::Ready(run),
            None => Probe::Pending(None),
        }
    })
    .await
}

/// Poll a run until its status is `completed`, whatever the conclusion.
///
/// Returns `Ok(false)` on timeout. A failed status request ends the wait with
/// that error.
pub async fn wait_for_completion(
    gateway: &dyn Gateway,
    repo: &RepoSlug,
    run_id: u64,
    policy: PollPolicy,
) -> Result<bool> {
    let run = poll_until("completion", policy, move || async move {
        match get_run(gateway, repo, run_id).await {
            Ok(run) if run.status.is_completed() => Probe::Ready(Ok(run)),
            Ok(run) => Probe::Pending(Some(format!("status={}", run.status))),
            Err(e) => Probe::Ready(Err(e)),
        }
    })
    .await;
    match run {
        Some(run) => {
            let run = run.with_context(|| format!("Failed to fetch status of run {run_id}"))?;
            tracing::info!("Run completed with conclusion={}", run.conclusion());
            Ok(true)
        }
        None => {
            tracing::info!("Wait timeout exceeded");
            Ok(false)
        }
    }
}

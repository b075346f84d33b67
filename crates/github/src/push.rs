//! Push the current branch, then fetch the logs of the CI run it triggers.

use std::path::PathBuf;

use anyhow::{Result, bail};
use fetch_ci_logs_core::{
    config::EnvConfig,
    git::VersionControl,
    resolve::{resolve_branch, resolve_remote},
};

use crate::fetch::{FetchOutcome, FetchRequest, require_token, run_fetch};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AfterPushRequest {
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub skip_push: bool,
    pub workflow: Option<String>,
    pub wait_for_completion: bool,
    pub timeout: Option<u64>,
    pub interval: Option<u64>,
    pub dest_root: Option<PathBuf>,
}

/// Push (unless skipped) and build the fetch for the pushed commit.
///
/// The returned request always waits for the run to appear, since a freshly
/// pushed commit has no run yet.
pub async fn push_and_prepare(
    request: AfterPushRequest,
    env: &EnvConfig,
    vcs: &dyn VersionControl,
) -> Result<FetchRequest> {
    require_token(env)?;
    let remote = resolve_remote(request.remote.as_deref(), env);
    let branch = resolve_branch(request.branch.as_deref(), env, vcs).await;
    if branch.is_empty() {
        bail!("Unable to determine git branch");
    }

    if request.skip_push || env.skip_push {
        tracing::info!("Skipping git push");
    } else {
        tracing::info!("Pushing {branch} to {remote}...");
        if let Err(e) = vcs.push(&remote, &branch).await {
            tracing::debug!("git push: {e:#}");
            bail!("git push failed for {remote} {branch}");
        }
    }

    let head_sha = match &env.head_sha {
        Some(sha) => Some(sha.clone()),
        None => vcs.resolve_commit(&branch).await,
    };
    Ok(FetchRequest {
        workflow: request.workflow,
        head_sha,
        wait_for_run: true,
        wait_for_completion: request.wait_for_completion,
        timeout: request.timeout,
        interval: request.interval,
        dest_root: request.dest_root,
        ..Default::default()
    })
}

pub async fn after_push(
    request: AfterPushRequest,
    env: &EnvConfig,
    vcs: &dyn VersionControl,
) -> Result<FetchOutcome> {
    let fetch = push_and_prepare(request, env, vcs).await?;
    run_fetch(fetch, env, vcs).await
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Mutex};

    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use axum::{Json, Router, routing::get};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Default)]
    struct PushVcs {
        branch: Option<String>,
        commit: Option<String>,
        fail_push: bool,
        pushed: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl VersionControl for PushVcs {
        async fn remote_url(&self, _remote: &str) -> Option<String> { None }

        async fn head_sha(&self) -> Option<String> { None }

        async fn resolve_commit(&self, _rev: &str) -> Option<String> { self.commit.clone() }

        async fn current_branch(&self) -> Option<String> { self.branch.clone() }

        async fn push(&self, remote: &str, branch: &str) -> Result<()> {
            self.pushed.lock().unwrap().push((remote.to_string(), branch.to_string()));
            if self.fail_push { Err(anyhow!("git exited with exit status: 1")) } else { Ok(()) }
        }
    }

    fn env() -> EnvConfig { EnvConfig { token: Some("test-token".into()), ..Default::default() } }

    fn vcs() -> PushVcs {
        PushVcs {
            branch: Some("main".into()),
            commit: Some("abc1234def".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_push_then_fetch_request() {
        let vcs = vcs();
        let request = AfterPushRequest {
            workflow: Some("build.yml".into()),
            wait_for_completion: true,
            timeout: Some(60),
            ..Default::default()
        };
        let fetch = push_and_prepare(request, &env(), &vcs).await.unwrap();
        assert_eq!(
            vcs.pushed.lock().unwrap().as_slice(),
            [("origin".to_string(), "main".to_string())]
        );
        assert_eq!(fetch, FetchRequest {
            workflow: Some("build.yml".into()),
            head_sha: Some("abc1234def".into()),
            wait_for_run: true,
            wait_for_completion: true,
            timeout: Some(60),
            ..Default::default()
        });
    }

    #[tokio::test]
    async fn test_remote_branch_and_sha_from_env() {
        let vcs = vcs();
        let env = EnvConfig {
            remote: Some("upstream".into()),
            branch: Some("release".into()),
            head_sha: Some("feedface".into()),
            ..env()
        };
        let fetch = push_and_prepare(AfterPushRequest::default(), &env, &vcs).await.unwrap();
        assert_eq!(
            vcs.pushed.lock().unwrap().as_slice(),
            [("upstream".to_string(), "release".to_string())]
        );
        assert_eq!(fetch.head_sha.as_deref(), Some("feedface"));

        let request = AfterPushRequest {
            remote: Some("fork".into()),
            branch: Some("topic".into()),
            ..Default::default()
        };
        push_and_prepare(request, &env, &vcs).await.unwrap();
        assert_eq!(vcs.pushed.lock().unwrap()[1], ("fork".to_string(), "topic".to_string()));
    }

    #[tokio::test]
    async fn test_skip_push() {
        let vcs = vcs();
        let request = AfterPushRequest { skip_push: true, ..Default::default() };
        push_and_prepare(request, &env(), &vcs).await.unwrap();
        let env = EnvConfig { skip_push: true, ..env() };
        push_and_prepare(AfterPushRequest::default(), &env, &vcs).await.unwrap();
        assert!(vcs.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_failure() {
        let vcs = PushVcs { fail_push: true, ..vcs() };
        let err = push_and_prepare(AfterPushRequest::default(), &env(), &vcs).await.unwrap_err();
        assert_eq!(err.to_string(), "git push failed for origin main");
    }

    #[tokio::test]
    async fn test_missing_branch_or_token() {
        let vcs = PushVcs::default();
        let err = push_and_prepare(AfterPushRequest::default(), &env(), &vcs).await.unwrap_err();
        assert_eq!(err.to_string(), "Unable to determine git branch");

        let vcs = self::vcs();
        let err = push_and_prepare(AfterPushRequest::default(), &EnvConfig::default(), &vcs)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN"), "{err}");
        assert!(vcs.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_after_push_against_local_api() {
        let router = Router::new()
            .route(
                "/repos/acme/widgets/actions/workflows/ci.yml/runs",
                get(|| async {
                    Json(json!({"total_count": 1, "workflow_runs": [
                        {"id": 31, "run_number": 4, "head_sha": "abc1234def", "status": "queued"}
                    ]}))
                }),
            )
            .route(
                "/repos/acme/widgets/actions/runs/31",
                get(|| async { Json(json!({"id": 31, "status": "completed"})) }),
            )
            .route("/repos/acme/widgets/actions/runs/31/logs", get(|| async { "zip" }))
            .route(
                "/repos/acme/widgets/actions/runs/31/jobs",
                get(|| async {
                    Json(json!({"total_count": 1, "jobs": [{"id": 8, "name": "test"}]}))
                }),
            )
            .route("/repos/acme/widgets/actions/jobs/8/logs", get(|| async { "ok" }));
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let dest = tempfile::tempdir().unwrap();
        let env = EnvConfig {
            repo: Some("acme/widgets".into()),
            api_url: Some(format!("http://{addr}")),
            ..env()
        };
        let vcs = vcs();
        let request =
            AfterPushRequest { dest_root: Some(dest.path().to_path_buf()), ..Default::default() };
        let outcome = after_push(request, &env, &vcs).await.unwrap();
        assert_eq!(outcome.run_id, 31);
        assert_eq!(outcome.dir, dest.path().join("31-abc1234"));
        assert_eq!(outcome.saved_jobs, 1);
        assert_eq!(std::fs::read_to_string(outcome.dir.join("job_8_test.log")).unwrap(), "ok");
        assert_eq!(vcs.pushed.lock().unwrap().len(), 1);
    }
}

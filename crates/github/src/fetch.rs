use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use fetch_ci_logs_core::{
    config::{DEFAULT_DEST_ROOT, EnvConfig, PollPolicy},
    git::VersionControl,
    models::RepoSlug,
    resolve::{resolve_head_sha, resolve_repo, resolve_workflow},
    util::{job_log_name, run_archive_name, run_dir, run_metadata_name},
};

use crate::{
    DEFAULT_API_URL, Gateway, GitHubClient, job_logs_path, list_jobs,
    poll::{wait_for_completion, wait_for_run},
    run_logs_path, run_path,
    runs::locate_run,
};

/// What the caller asked for; every field may be left to the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub workflow: Option<String>,
    pub repo: Option<String>,
    pub head_sha: Option<String>,
    pub run_id: Option<u64>,
    pub wait_for_run: bool,
    pub wait_for_completion: bool,
    pub timeout: Option<u64>,
    pub interval: Option<u64>,
    pub dest_root: Option<PathBuf>,
}

/// Fully resolved settings for one fetch.
#[derive(Clone)]
pub struct FetchOptions {
    pub token: String,
    pub api_url: String,
    pub repo: RepoSlug,
    pub workflow: String,
    /// Target commit; empty when it could not be determined.
    pub head_sha: String,
    pub run_id: Option<u64>,
    pub wait_for_run: bool,
    pub wait_for_completion: bool,
    pub poll: PollPolicy,
    pub dest_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub dir: PathBuf,
    pub run_id: u64,
    pub saved_jobs: usize,
    pub failed_jobs: usize,
}

pub fn require_token(env: &EnvConfig) -> Result<String> {
    env.token.clone().ok_or_else(|| anyhow!("GITHUB_TOKEN (or GH_TOKEN) is required"))
}

/// Validate the request against the environment and working copy.
///
/// Fails before any network activity when the token or repository is missing.
pub async fn prepare_fetch(
    request: FetchRequest,
    env: &EnvConfig,
    vcs: &dyn VersionControl,
) -> Result<FetchOptions> {
    let token = require_token(env)?;
    let workflow = resolve_workflow(request.workflow.as_deref(), env);
    let repo = resolve_repo(request.repo.as_deref(), env, vcs)
        .await?
        .ok_or_else(|| anyhow!("GITHUB_REPO could not be determined"))?;
    let head_sha = resolve_head_sha(request.head_sha.as_deref(), env, vcs).await;
    let run_id = match request.run_id {
        Some(run_id) => Some(run_id),
        None => env
            .run_id
            .as_deref()
            .map(|id| id.parse::<u64>().with_context(|| format!("Invalid RUN_ID '{id}'")))
            .transpose()?,
    };
    let poll = PollPolicy::resolve(request.timeout, request.interval, env)?;
    Ok(FetchOptions {
        token,
        api_url: env.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        repo,
        workflow,
        head_sha,
        run_id,
        wait_for_run: request.wait_for_run || env.wait_for_run,
        wait_for_completion: request.wait_for_completion || env.wait_for_completion,
        poll,
        dest_root: request.dest_root.unwrap_or_else(|| PathBuf::from(DEFAULT_DEST_ROOT)),
    })
}

/// Resolve, connect and fetch.
pub async fn run_fetch(
    request: FetchRequest,
    env: &EnvConfig,
    vcs: &dyn VersionControl,
) -> Result<FetchOutcome> {
    let options = prepare_fetch(request, env, vcs).await?;
    let client = GitHubClient::with_base_url(&options.token, &options.api_url)?;
    fetch_logs(&client, &options).await
}

async fn resolve_run_id(gateway: &dyn Gateway, options: &FetchOptions) -> Result<u64> {
    if let Some(run_id) = options.run_id {
        tracing::info!("Using provided run ID {run_id}");
        return Ok(run_id);
    }
    let FetchOptions { repo, workflow, head_sha, .. } = options;
    tracing::info!("Looking for workflow run for {workflow} in {repo}...");
    let run = if options.wait_for_run {
        wait_for_run(gateway, repo, workflow, head_sha, options.poll).await
    } else {
        locate_run(gateway, repo, workflow, head_sha).await
    };
    let run = run.ok_or_else(|| anyhow!("No workflow runs found for {workflow} in {repo}"))?;
    tracing::info!(
        "Found run #{} (id {}) status={} conclusion={} created_at={}",
        run.run_number,
        run.id,
        run.status,
        run.conclusion(),
        run.created_at
    );
    Ok(run.id)
}

/// Download everything for one run into its destination directory.
///
/// The run log archive is written first. Job logs are best effort: the archive
/// already holds every job's output.
pub async fn fetch_logs(gateway: &dyn Gateway, options: &FetchOptions) -> Result<FetchOutcome> {
    let repo = &options.repo;
    let run_id = resolve_run_id(gateway, options).await?;

    let dir = run_dir(&options.dest_root, run_id, &options.head_sha);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let archive_path = dir.join(run_archive_name(run_id));
    tracing::info!("Downloading run logs...");
    gateway.download(&run_logs_path(repo, run_id), &archive_path).await?;
    tracing::info!("Saved run logs => {}", archive_path.display());

    if options.wait_for_completion {
        tracing::info!("Waiting for run {run_id} to complete...");
        wait_for_completion(gateway, repo, run_id, options.poll).await?;
    }

    let metadata = gateway.fetch_json(&run_path(repo, run_id)).await?;
    let metadata_path = dir.join(run_metadata_name(run_id));
    let json = serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata")?;
    tokio::fs::write(&metadata_path, json)
        .await
        .with_context(|| format!("Failed to write {}", metadata_path.display()))?;
    tracing::info!("Saved run metadata => {}", metadata_path.display());

    let (saved_jobs, failed_jobs) = match download_job_logs(gateway, repo, run_id, &dir).await {
        Ok(counts) => counts,
        Err(e) => {
            tracing::warn!("Could not download individual job logs: {e:#}");
            (0, 0)
        }
    };

    tracing::info!("All logs saved under {}", dir.display());
    Ok(FetchOutcome { dir, run_id, saved_jobs, failed_jobs })
}

async fn download_job_logs(
    gateway: &dyn Gateway,
    repo: &RepoSlug,
    run_id: u64,
    dir: &Path,
) -> Result<(usize, usize)> {
    let jobs = list_jobs(gateway, repo, run_id).await?;
    tracing::info!("Downloading {} job logs...", jobs.len());
    let mut saved = 0;
    let mut failed = 0;
    for job in jobs {
        let path = dir.join(job_log_name(job.id, &job.name));
        match gateway.download(&job_logs_path(repo, job.id), &path).await {
            Ok(_) => {
                tracing::info!("Saved job log => {}", path.display());
                saved += 1;
            }
            Err(e) => {
                tracing::warn!("Could not download log for job {} ({}): {e:#}", job.id, job.name);
                failed += 1;
            }
        }
    }
    Ok((saved, failed))
}

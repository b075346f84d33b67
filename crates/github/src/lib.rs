pub mod fetch;
pub mod poll;
pub mod push;
pub mod runs;

use std::{path::Path, pin::pin, time::Duration};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use fetch_ci_logs_core::models::{Job, JobList, RepoSlug, WorkflowRun, WorkflowRunList};
use futures_util::TryStreamExt;
use reqwest::{
    Response,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LOCATION},
    redirect::Policy,
};
use serde_json::Value;
use tokio::{fs::File, io::AsyncWriteExt};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("fetch-ci-logs/", env!("CARGO_PKG_VERSION"));
const API_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Request layer over the GitHub REST API.
///
/// Paths are relative to the API root, e.g. `/repos/acme/widgets/actions/runs/1`.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn fetch_json(&self, path: &str) -> Result<Value>;

    /// Stream the response body for `path` into `dest`, returning the number of
    /// bytes written.
    async fn download(&self, path: &str, dest: &Path) -> Result<u64>;
}

#[derive(Clone)]
pub struct GitHubClient {
    base_url: String,
    api: reqwest::Client,
    // Carries no credentials; used for pre-signed redirect targets.
    download: reqwest::Client,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> { Self::with_base_url(token, DEFAULT_API_URL) }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        Self::with_timeouts(token, base_url, API_TIMEOUT, DOWNLOAD_TIMEOUT)
    }

    /// Every request, including a streamed body, must finish within its timeout.
    fn with_timeouts(
        token: &str,
        base_url: &str,
        api_timeout: Duration,
        download_timeout: Duration,
    ) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid API URL '{base_url}'"))?;
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .context("Token contains invalid characters")?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let api = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(Policy::none())
            .timeout(api_timeout)
            .build()
            .context("Failed to create GitHub client")?;
        let download = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(download_timeout)
            .build()
            .context("Failed to create download client")?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), api, download })
    }

    fn url(&self, path: &str) -> Result<Url> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&url).with_context(|| format!("Invalid request path '{path}'"))
    }
}

#[async_trait]
impl Gateway for GitHubClient {
    async fn fetch_json(&self, path: &str) -> Result<Value> {
        let response = self
            .api
            .get(self.url(path)?)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {path}"))?;
        let response = check_status(response, path)?;
        response.json().await.with_context(|| format!("Failed to parse response from {path}"))
    }

    async fn download(&self, path: &str, dest: &Path) -> Result<u64> {
        let url = self.url(path)?;
        let response = self
            .api
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch {path}"))?;
        let status = response.status();
        let response = if status.is_redirection() {
            let Some(location) = response.headers().get(LOCATION) else {
                bail!("Failed to fetch {path}: {status} without Location header");
            };
            let location = location
                .to_str()
                .with_context(|| format!("Failed to fetch {path}: invalid Location header"))?;
            let target = url
                .join(location)
                .with_context(|| format!("Failed to fetch {path}: invalid redirect target"))?;
            tracing::debug!("Following redirect for {path} to {}", target.host_str().unwrap_or(""));
            let response = self
                .download
                .get(target)
                .send()
                .await
                .map_err(reqwest::Error::without_url)
                .with_context(|| format!("Failed to fetch {path} from redirect"))?;
            check_status(response, path)?
        } else {
            check_status(response, path)?
        };
        write_body(response, dest)
            .await
            .with_context(|| format!("Failed to write {} to {}", path, dest.display()))
    }
}

fn check_status(response: Response, path: &str) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        bail!("Failed to fetch {path}: {status}");
    }
    Ok(response)
}

async fn write_body(response: Response, dest: &Path) -> Result<u64> {
    let mut file = File::create(dest).await?;
    let mut stream = pin!(response.bytes_stream());
    let mut written = 0u64;
    while let Some(chunk) = stream.try_next().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

pub fn workflow_runs_path(repo: &RepoSlug, workflow: &str, per_page: u32) -> String {
    format!("/repos/{repo}/actions/workflows/{workflow}/runs?per_page={per_page}")
}

pub fn run_path(repo: &RepoSlug, run_id: u64) -> String {
    format!("/repos/{repo}/actions/runs/{run_id}")
}

pub fn run_logs_path(repo: &RepoSlug, run_id: u64) -> String {
    format!("/repos/{repo}/actions/runs/{run_id}/logs")
}

pub fn run_jobs_path(repo: &RepoSlug, run_id: u64, page: u32) -> String {
    format!("/repos/{repo}/actions/runs/{run_id}/jobs?per_page=100&page={page}")
}

pub fn job_logs_path(repo: &RepoSlug, job_id: u64) -> String {
    format!("/repos/{repo}/actions/jobs/{job_id}/logs")
}

/// Most recent runs of a workflow, newest first.
pub async fn list_workflow_runs(
    gateway: &dyn Gateway,
    repo: &RepoSlug,
    workflow: &str,
    per_page: u32,
) -> Result<Vec<WorkflowRun>> {
    let path = workflow_runs_path(repo, workflow, per_page);
    let value = gateway.fetch_json(&path).await?;
    let list: WorkflowRunList =
        serde_json::from_value(value).with_context(|| format!("Failed to parse {path}"))?;
    Ok(list.workflow_runs)
}

pub async fn get_run(gateway: &dyn Gateway, repo: &RepoSlug, run_id: u64) -> Result<WorkflowRun> {
    let path = run_path(repo, run_id);
    let value = gateway.fetch_json(&path).await?;
    serde_json::from_value(value).with_context(|| format!("Failed to parse {path}"))
}

/// All jobs of a run, following pagination.
pub async fn list_jobs(gateway: &dyn Gateway, repo: &RepoSlug, run_id: u64) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    let mut page = 1;
    loop {
        let path = run_jobs_path(repo, run_id, page);
        let value = gateway.fetch_json(&path).await?;
        let list: JobList =
            serde_json::from_value(value).with_context(|| format!("Failed to parse {path}"))?;
        if list.jobs.is_empty() {
            break;
        }
        jobs.extend(list.jobs);
        if jobs.len() as u64 >= list.total_count {
            break;
        }
        page += 1;
    }
    Ok(jobs)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::HashMap,
        path::Path,
        sync::{Arc, Mutex},
    };

    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use serde_json::Value;

    use super::Gateway;

    /// Canned responses keyed by request path. Unknown paths fail.
    #[derive(Clone, Default)]
    pub struct FakeGateway {
        pub json: Arc<Mutex<HashMap<String, Vec<Value>>>>,
        pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeGateway {
        /// Queue a JSON response. Repeated responses for one path are served in
        /// order; the last one is repeated once the queue is drained.
        pub fn json(&self, path: &str, value: Value) -> &Self {
            self.json.lock().unwrap().entry(path.to_string()).or_default().push(value);
            self
        }

        pub fn file(&self, path: &str, contents: &[u8]) -> &Self {
            self.files.lock().unwrap().insert(path.to_string(), contents.to_vec());
            self
        }

        pub fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        async fn fetch_json(&self, path: &str) -> Result<Value> {
            self.calls.lock().unwrap().push(path.to_string());
            let mut json = self.json.lock().unwrap();
            let queue = json.get_mut(path).ok_or_else(|| anyhow!("Failed to fetch {path}: 404"))?;
            if queue.len() > 1 { Ok(queue.remove(0)) } else { Ok(queue[0].clone()) }
        }

        async fn download(&self, path: &str, dest: &Path) -> Result<u64> {
            self.calls.lock().unwrap().push(path.to_string());
            let contents = self
                .files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("Failed to fetch {path}: 404"))?;
            std::fs::write(dest, &contents)?;
            Ok(contents.len() as u64)
        }
    }
}

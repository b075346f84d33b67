use std::time::Duration;

use anyhow::{Result, bail};

/// Environment variables checked for the API token, in priority order.
pub const TOKEN_VARS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN", "GH_PAT"];

pub const DEFAULT_WORKFLOW: &str = "ci.yml";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_DEST_ROOT: &str = "log/ci";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Snapshot of every environment variable the tool recognizes.
///
/// Captured once at the CLI boundary and passed down by value; nothing below
/// the CLI reads the process environment.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct EnvConfig {
    pub token: Option<String>,
    pub repo: Option<String>,
    pub workflow: Option<String>,
    pub head_sha: Option<String>,
    pub run_id: Option<String>,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub api_url: Option<String>,
    pub wait_for_run: bool,
    pub wait_for_completion: bool,
    pub skip_push: bool,
    pub timeout: Option<String>,
    pub interval: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self { Self::from_lookup(|key| std::env::var(key).ok()) }

    /// Build from an arbitrary key lookup. Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            token: TOKEN_VARS.iter().find_map(|&key| get(key)),
            repo: get("GITHUB_REPO"),
            workflow: get("GITHUB_WORKFLOW"),
            head_sha: get("GIT_SHA"),
            run_id: get("RUN_ID"),
            remote: get("GIT_REMOTE"),
            branch: get("GIT_BRANCH"),
            api_url: get("GITHUB_API_URL"),
            wait_for_run: is_truthy(lookup("WAIT_FOR_RUN").as_deref())
                || is_truthy(lookup("WAIT").as_deref()),
            wait_for_completion: is_truthy(lookup("WAIT_FOR_COMPLETION").as_deref()),
            skip_push: is_truthy(lookup("SKIP_PUSH").as_deref()),
            timeout: get("WAIT_TIMEOUT"),
            interval: get("WAIT_INTERVAL"),
        }
    }
}

/// Whether an environment-style flag value means "on".
pub fn is_truthy(value: Option<&str>) -> bool {
    let Some(value) = value else {
        return false;
    };
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on" | "y")
}

/// Bounds for a poll loop: total time budget and the pause between attempts.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
        }
    }
}

impl PollPolicy {
    pub fn from_secs(timeout: u64, interval: u64) -> Result<Self> {
        if interval == 0 {
            bail!("Polling interval must be at least 1 second");
        }
        Ok(Self { timeout: Duration::from_secs(timeout), interval: Duration::from_secs(interval) })
    }

    /// Resolve from an explicit value, then the environment, then the default.
    pub fn resolve(
        timeout: Option<u64>,
        interval: Option<u64>,
        env: &EnvConfig,
    ) -> Result<Self> {
        let timeout = match timeout {
            Some(timeout) => timeout,
            None => parse_secs("WAIT_TIMEOUT", env.timeout.as_deref())?
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        let interval = match interval {
            Some(interval) => interval,
            None => parse_secs("WAIT_INTERVAL", env.interval.as_deref())?
                .unwrap_or(DEFAULT_INTERVAL_SECS),
        };
        Self::from_secs(timeout, interval)
    }
}

fn parse_secs(name: &str, value: Option<&str>) -> Result<Option<u64>> {
    match value {
        None => Ok(None),
        Some(value) => match value.parse::<u64>() {
            Ok(secs) => Ok(Some(secs)),
            Err(_) => bail!("{name} must be a whole number of seconds, got '{value}'"),
        },
    }
}

use std::{process::Stdio, sync::OnceLock};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::models::RepoSlug;

/// Access to the local working copy.
///
/// Lookups never fail: anything that goes wrong (not a repository, missing
/// remote, git not installed) yields `None` and the caller decides whether the
/// value was required.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn remote_url(&self, remote: &str) -> Option<String>;

    async fn head_sha(&self) -> Option<String>;

    /// Commit a revision (branch, tag, sha) points at.
    async fn resolve_commit(&self, rev: &str) -> Option<String>;

    async fn current_branch(&self) -> Option<String>;

    async fn push(&self, remote: &str, branch: &str) -> Result<()>;
}

/// [`VersionControl`] backed by the `git` executable in the current directory.
#[derive(Debug, Clone, Default)]
pub struct Git;

impl Git {
    async fn output(&self, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            tracing::debug!("git {} exited with {}", args.join(" "), output.status);
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!stdout.is_empty()).then_some(stdout)
    }
}

#[async_trait]
impl VersionControl for Git {
    async fn remote_url(&self, remote: &str) -> Option<String> {
        self.output(&["remote", "get-url", remote]).await
    }

    async fn head_sha(&self) -> Option<String> { self.output(&["rev-parse", "HEAD"]).await }

    async fn resolve_commit(&self, rev: &str) -> Option<String> {
        let rev = format!("{rev}^{{commit}}");
        self.output(&["rev-parse", "--verify", "--quiet", &rev]).await
    }

    async fn current_branch(&self) -> Option<String> {
        self.output(&["rev-parse", "--abbrev-ref", "HEAD"]).await.filter(|b| b != "HEAD")
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        let status = Command::new("git")
            .args(["push", remote, branch])
            .stdin(Stdio::null())
            .status()
            .await
            .context("Failed to run git")?;
        if !status.success() {
            bail!("git exited with {status}");
        }
        Ok(())
    }
}

/// Extract `owner/repo` from a git remote URL.
///
/// Accepts scp-style (`git@host:owner/repo.git`) and URL-style
/// (`https://host/owner/repo.git`, `ssh://git@host:22/owner/repo`) remotes.
pub fn parse_remote_url(url: &str) -> Option<RepoSlug> {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    let caps = REGEX
        .get_or_init(|| {
            Regex::new(concat!(
                r"^(?:[A-Za-z][A-Za-z0-9+.\-]*://)?(?:[^@/]+@)?[^/:]+(?::\d+)?",
                r"[:/](?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?/?$",
            ))
            .unwrap()
        })
        .captures(url.trim())?;
    let owner = caps.name("owner")?.as_str();
    let repo = caps.name("repo")?.as_str();
    Some(RepoSlug::new(owner, repo))
}

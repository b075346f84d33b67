//! Resolution of repository, commit and branch.
//!
//! Every value follows the same precedence: explicit caller input, then the
//! environment snapshot, then introspection of the local working copy. Empty
//! strings count as unset at every level.

use anyhow::Result;

use crate::{
    config::{DEFAULT_REMOTE, DEFAULT_WORKFLOW, EnvConfig},
    git::{VersionControl, parse_remote_url},
    models::RepoSlug,
};

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn first_of<'a>(explicit: Option<&'a str>, env: Option<&'a str>) -> Option<&'a str> {
    non_empty(explicit).or_else(|| non_empty(env))
}

pub fn resolve_workflow(explicit: Option<&str>, env: &EnvConfig) -> String {
    first_of(explicit, env.workflow.as_deref()).unwrap_or(DEFAULT_WORKFLOW).to_string()
}

pub fn resolve_remote(explicit: Option<&str>, env: &EnvConfig) -> String {
    first_of(explicit, env.remote.as_deref()).unwrap_or(DEFAULT_REMOTE).to_string()
}

/// Resolve the repository slug. `Ok(None)` means nothing could be determined;
/// an explicit or environment value that is present but malformed is an error.
pub async fn resolve_repo(
    explicit: Option<&str>,
    env: &EnvConfig,
    vcs: &dyn VersionControl,
) -> Result<Option<RepoSlug>> {
    if let Some(repo) = first_of(explicit, env.repo.as_deref()) {
        return repo.parse().map(Some);
    }
    let remote = resolve_remote(None, env);
    let Some(url) = vcs.remote_url(&remote).await else {
        tracing::debug!("No URL for git remote {remote}");
        return Ok(None);
    };
    let slug = parse_remote_url(&url);
    if slug.is_none() {
        tracing::debug!("Could not parse repository from remote URL {url}");
    }
    Ok(slug)
}

/// Resolve the target commit. Returns an empty string when unknown.
pub async fn resolve_head_sha(
    explicit: Option<&str>,
    env: &EnvConfig,
    vcs: &dyn VersionControl,
) -> String {
    if let Some(sha) = first_of(explicit, env.head_sha.as_deref()) {
        return sha.to_string();
    }
    vcs.head_sha().await.unwrap_or_default()
}

/// Resolve the branch. Returns an empty string when unknown.
pub async fn resolve_branch(
    explicit: Option<&str>,
    env: &EnvConfig,
    vcs: &dyn VersionControl,
) -> String {
    if let Some(branch) = first_of(explicit, env.branch.as_deref()) {
        return branch.to_string();
    }
    vcs.current_branch().await.unwrap_or_default()
}

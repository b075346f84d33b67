use std::path::PathBuf;

use anyhow::Result;
use argp::FromArgs;
use fetch_ci_logs_core::{config::EnvConfig, git::Git};
use fetch_ci_logs_github::fetch::{FetchRequest, run_fetch};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Download the log archive, metadata and job logs of a workflow run.
#[argp(subcommand, name = "fetch-logs")]
pub struct Args {
    #[argp(option, short = 'w')]
    /// workflow file name or id (default: GITHUB_WORKFLOW or ci.yml)
    workflow: Option<String>,
    #[argp(option, short = 'r')]
    /// repository as owner/name (default: GITHUB_REPO or the git remote)
    repo: Option<String>,
    #[argp(option, short = 'i')]
    /// fetch this run instead of looking one up
    run_id: Option<u64>,
    #[argp(switch)]
    /// poll until a run for the commit appears
    wait: bool,
    #[argp(switch)]
    /// poll until the run has completed before saving metadata
    wait_for_completion: bool,
    #[argp(option)]
    /// polling timeout in seconds (default: 300)
    timeout: Option<u64>,
    #[argp(option)]
    /// polling interval in seconds (default: 5)
    interval: Option<u64>,
    #[argp(option, short = 'o')]
    /// output directory (default: log/ci)
    output: Option<PathBuf>,
}

impl From<Args> for FetchRequest {
    fn from(args: Args) -> Self {
        Self {
            workflow: args.workflow,
            repo: args.repo,
            head_sha: None,
            run_id: args.run_id,
            wait_for_run: args.wait,
            wait_for_completion: args.wait_for_completion,
            timeout: args.timeout,
            interval: args.interval,
            dest_root: args.output,
        }
    }
}

pub async fn run(args: Args, env: &EnvConfig) -> Result<()> {
    let outcome = run_fetch(args.into(), env, &Git).await?;
    if outcome.failed_jobs > 0 {
        tracing::warn!("{} job logs could not be downloaded", outcome.failed_jobs);
    }
    Ok(())
}

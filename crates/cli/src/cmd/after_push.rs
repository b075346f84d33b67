use std::path::PathBuf;

use anyhow::Result;
use argp::FromArgs;
use fetch_ci_logs_core::{config::EnvConfig, git::Git};
use fetch_ci_logs_github::push::{AfterPushRequest, after_push};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Push the current branch, then fetch the logs of the run it triggers.
#[argp(subcommand, name = "after-push")]
pub struct Args {
    #[argp(option, short = 'r')]
    /// git remote to push to (default: GIT_REMOTE or origin)
    remote: Option<String>,
    #[argp(option, short = 'b')]
    /// branch to push (default: GIT_BRANCH or the current branch)
    branch: Option<String>,
    #[argp(switch)]
    /// do not push, only wait for and fetch the run
    skip_push: bool,
    #[argp(option, short = 'w')]
    /// workflow file name or id (default: GITHUB_WORKFLOW or ci.yml)
    workflow: Option<String>,
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

pub async fn run(args: Args, env: &EnvConfig) -> Result<()> {
    let request = AfterPushRequest {
        remote: args.remote,
        branch: args.branch,
        skip_push: args.skip_push,
        workflow: args.workflow,
        wait_for_completion: args.wait_for_completion,
        timeout: args.timeout,
        interval: args.interval,
        dest_root: args.output,
    };
    after_push(request, env, &Git).await?;
    Ok(())
}

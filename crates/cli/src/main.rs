mod cmd;

use anyhow::anyhow;
use argp::FromArgs;
use fetch_ci_logs_core::config::EnvConfig;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Download GitHub Actions logs for a commit.
struct TopLevel {
    #[argp(switch, short = 'V')]
    /// print version information and exit
    version: bool,
    #[argp(subcommand)]
    command: Option<SubCommand>,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    FetchLogs(cmd::fetch_logs::Args),
    AfterPush(cmd::after_push::Args),
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    if args.version {
        println!("{}", version());
        return;
    }
    let env = EnvConfig::from_env();
    let result = match args.command {
        Some(SubCommand::FetchLogs(args)) => cmd::fetch_logs::run(args, &env).await,
        Some(SubCommand::AfterPush(args)) => cmd::after_push::run(args, &env).await,
        None => Err(anyhow!("No command given, run with --help for usage")),
    };
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn version() -> String { format!("fetch-ci-logs {}", env!("CARGO_PKG_VERSION")) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), concat!("fetch-ci-logs ", env!("CARGO_PKG_VERSION")));
        assert!(!env!("CARGO_PKG_VERSION").is_empty());
    }
}

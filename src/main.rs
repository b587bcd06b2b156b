//! release-pilot CLI
//!
//! Releases one package by landing a changeset and merging the version PR.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use release_pilot::{
    parse_repo_slug, CliNoteGenerator, ConsoleSink, Error, GhCli, GitCli, JsonSink, OutputSink,
    ReleaseConfig, ReleaseRequest, ReleaseRunner, ReleaseType, Stage, Validate,
};

#[derive(Parser, Debug)]
#[command(name = "release-pilot")]
#[command(version, about = "Drive a changeset release from clone to merged version PR")]
struct Cli {
    /// Repository to release (HTTPS or SSH URL)
    repo_url: String,

    /// Release type; skips release type analysis
    #[arg(long = "type", value_name = "TYPE")]
    release_type: Option<ReleaseType>,

    /// Release message; skips summary generation
    #[arg(short, long)]
    message: Option<String>,

    /// Skip every confirmation and accept suggestions
    #[arg(short, long)]
    yes: bool,

    /// Print the run report as JSON on stdout (implies --yes)
    #[arg(long)]
    json: bool,

    /// Stop the run after this stage (e.g. commit-and-push)
    #[arg(long, value_name = "STAGE")]
    stop_after: Option<Stage>,

    /// Base branch to release from
    #[arg(long, value_name = "BRANCH")]
    base: Option<String>,

    /// Configuration file (default: ./release-pilot.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to wait for CI checks on each PR. A PR with no checks keeps
    /// waiting until this runs out unless `polling.checks.require_checks`
    /// is false in the config file.
    #[arg(long, value_name = "SECS")]
    checks_timeout: Option<u64>,

    /// Seconds to wait for the version PR to appear
    #[arg(long, value_name = "SECS")]
    discovery_timeout: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ReleaseConfig, Error> {
    let mut config = ReleaseConfig::load(cli.config.as_deref())?;

    if let Some(base) = &cli.base {
        config.repository.base_branch = base.clone();
    }
    if let Some(secs) = cli.checks_timeout {
        config.polling.checks.timeout_secs = secs;
    }
    if let Some(secs) = cli.discovery_timeout {
        config.polling.discovery.timeout_secs = secs;
    }

    for warning in config.validate().into_result()? {
        tracing::warn!("{}", warning);
    }
    Ok(config)
}

fn build_runner(cli: &Cli, config: ReleaseConfig) -> Result<ReleaseRunner, Error> {
    let slug = parse_repo_slug(&cli.repo_url).ok_or_else(|| {
        Error::Config(format!("cannot derive owner/name from {}", cli.repo_url))
    })?;

    let notes = CliNoteGenerator::new(config.notes.backend)
        .with_model(config.notes.model.clone())
        .with_timeout(config.notes.timeout());

    let sink: Arc<dyn OutputSink> = if cli.json {
        Arc::new(JsonSink)
    } else {
        Arc::new(ConsoleSink::new(cli.yes))
    };

    Ok(ReleaseRunner::new(
        config,
        Arc::new(GitCli::new()),
        Arc::new(GhCli::new(slug)),
        Arc::new(notes),
        sink,
    ))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runner = match load_config(&cli).and_then(|config| build_runner(&cli, config)) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let request = ReleaseRequest::new(cli.repo_url.clone())
        .with_release_type(cli.release_type)
        .with_message(cli.message.clone())
        .with_stop_after(cli.stop_after);

    let report = runner.run_until(&request, tokio::signal::ctrl_c()).await;
    if report.exit_code() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn checks_timeout_help_names_empty_snapshot_behaviour() {
        let command = Cli::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "checks_timeout")
            .and_then(|arg| arg.get_help())
            .map(|help| help.to_string())
            .expect("--checks-timeout has help text");

        assert!(help.contains("no checks"));
        assert!(help.contains("polling.checks.require_checks"));
    }
}

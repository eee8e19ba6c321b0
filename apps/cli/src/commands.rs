//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use tracing::info;

use llmdocs_core::{EventSink, RunContext, RunOptions, SilentSink};
use llmdocs_shared::{AppConfig, RunSummary, init_config, load_config, resolve_config_path};

use crate::sinks::{ConsoleProgress, Fanout, JsonlLog};

/// Start marker of the structured summary on stdout.
const SUMMARY_START: &str = "---JSON_SUMMARY---";
/// End marker of the structured summary on stdout.
const SUMMARY_END: &str = "---END_SUMMARY---";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// llmdocs: generate and validate an LLM-ready language reference.
#[derive(Parser)]
#[command(
    name = "llmdocs",
    version,
    about = "Fetch upstream docs, assemble a compact reference with an LLM, and validate it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./llmdocs.toml, then ~/.llmdocs/llmdocs.toml).
    #[arg(long, global = true, env = "LLMDOCS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline: fetch, extract, assemble, validate.
    Run {
        /// Reuse documents from the fetch cache.
        #[arg(long)]
        skip_fetch: bool,

        /// Reuse the persisted extraction records.
        #[arg(long)]
        skip_extract: bool,

        /// Only validate the existing candidate document.
        #[arg(long, conflicts_with_all = ["skip_fetch", "skip_extract"])]
        validate_only: bool,

        /// Suppress progress lines; print only the JSON summary.
        #[arg(long)]
        json: bool,

        /// Write every pipeline event to this file as JSON lines.
        #[arg(long)]
        event_log: Option<PathBuf>,
    },

    /// Validate a candidate document (defaults to the configured candidate).
    Validate {
        /// Candidate document to validate.
        path: Option<PathBuf>,

        /// Suppress progress lines; print only the JSON summary.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default llmdocs.toml into the current directory.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries
/// progress lines and the summary.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "llmdocs=warn",
        1 => "llmdocs=info",
        2 => "llmdocs=debug",
        _ => "llmdocs=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command and return the process exit code.
pub(crate) async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            skip_fetch,
            skip_extract,
            validate_only,
            json,
            event_log,
        } => {
            let opts = RunOptions {
                skip_fetch,
                skip_extract,
                validate_only,
            };
            cmd_run(config_path, opts, json, event_log.as_deref(), None).await
        }
        Command::Validate { path, json } => {
            let opts = RunOptions {
                validate_only: true,
                ..RunOptions::default()
            };
            cmd_run(config_path, opts, json, None, path.as_deref()).await
        }
        Command::Config { action } => {
            match action {
                ConfigAction::Init => cmd_config_init()?,
                ConfigAction::Show => cmd_config_show(config_path)?,
            }
            Ok(0)
        }
    }
}

async fn cmd_run(
    config_path: Option<&Path>,
    opts: RunOptions,
    json: bool,
    event_log: Option<&Path>,
    candidate: Option<&Path>,
) -> Result<i32> {
    let mut sinks: Vec<Box<dyn EventSink>> = Vec::new();
    if !json {
        sinks.push(Box::new(ConsoleProgress::new()));
    }
    if let Some(path) = event_log {
        let log = JsonlLog::create(path)
            .map_err(|e| eyre!("cannot open event log {}: {e}", path.display()))?;
        sinks.push(Box::new(log));
    }
    let sink: Box<dyn EventSink> = if sinks.is_empty() {
        Box::new(SilentSink)
    } else {
        Box::new(Fanout(sinks))
    };

    // Config problems still end in a parseable summary.
    let ctx = match load_config(config_path)
        .map(|config| with_candidate(config, candidate))
        .and_then(RunContext::from_config)
    {
        Ok(ctx) => ctx,
        Err(e) => {
            let summary = RunSummary {
                error: Some(e.to_string()),
                ..RunSummary::new()
            };
            print_summary(&summary)?;
            return Ok(summary.exit_code());
        }
    };

    info!(
        skip_fetch = opts.skip_fetch,
        skip_extract = opts.skip_extract,
        validate_only = opts.validate_only,
        "starting pipeline"
    );
    let summary = llmdocs_core::run(&ctx, &opts, sink.as_ref()).await;
    print_summary(&summary)?;
    Ok(summary.exit_code())
}

/// Point the run at an explicit candidate, keeping its validation file
/// beside it.
fn with_candidate(mut config: AppConfig, candidate: Option<&Path>) -> AppConfig {
    if let Some(path) = candidate {
        config.paths.validation_file = validation_path_for(path);
        config.paths.candidate_file = path.to_path_buf();
    }
    config
}

fn validation_path_for(candidate: &Path) -> PathBuf {
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "candidate".into());
    candidate.with_file_name(format!("{stem}.validation.json"))
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    println!("\n{SUMMARY_START}");
    println!("{json}");
    println!("{SUMMARY_END}");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let path = init_config(&cwd)?;
    println!("Created {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    match resolve_config_path(config_path)? {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# No config file found, showing defaults"),
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "llmdocs",
            "-vv",
            "run",
            "--skip-fetch",
            "--json",
            "--event-log",
            "events.jsonl",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run {
                skip_fetch,
                skip_extract,
                validate_only,
                json,
                event_log,
            } => {
                assert!(skip_fetch);
                assert!(!skip_extract);
                assert!(!validate_only);
                assert!(json);
                assert_eq!(event_log, Some(PathBuf::from("events.jsonl")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn validate_only_conflicts_with_skips() {
        assert!(Cli::try_parse_from(["llmdocs", "run", "--validate-only", "--skip-fetch"]).is_err());
    }

    #[test]
    fn explicit_candidate_gets_sibling_validation_file() {
        let config = with_candidate(AppConfig::default(), Some(Path::new("out/draft.md")));
        assert_eq!(config.paths.candidate_file, PathBuf::from("out/draft.md"));
        assert_eq!(
            config.paths.validation_file,
            PathBuf::from("out/draft.validation.json")
        );
    }
}

//! Command-line front end for the Soothe Guard content safety pipeline.
//!
//! Reads text from arguments or stdin and runs it through the input or
//! response policy, or prints the raw analysis as JSON for rule debugging.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use soothe_guard::{FilterConfig, FilterPipeline, FilterReport};

/// Soothe Guard - content safety filtering for LLM narratives
#[derive(Parser, Debug)]
#[command(name = "soothe-guard", version, about)]
struct Args {
    /// Path to a JSON pipeline configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Phrase blacklist file, may be given multiple times
    #[arg(long = "blacklist", global = true)]
    blacklist_files: Vec<PathBuf>,

    /// Pattern rule file (JSON), may be given multiple times
    #[arg(long = "patterns", global = true)]
    pattern_files: Vec<PathBuf>,

    /// Context rule file (JSON), may be given multiple times
    #[arg(long = "context-rules", global = true)]
    context_files: Vec<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the input policy: prints the message to forward, exits 1 on redirect
    Check {
        /// Text to check; reads stdin when omitted
        text: Option<String>,
    },
    /// Run the response policy: prints the filtered text
    Filter {
        /// Text to filter; reads stdin when omitted
        text: Option<String>,
    },
    /// Print the raw analysis result as JSON
    Analyze {
        /// Text to analyze; reads stdin when omitted
        text: Option<String>,
    },
    /// Analyze one text per stdin line and print batch statistics as JSON
    Report,
}

fn init_logging(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("soothe_guard={log_level},warn")));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the pipeline config from `--config` plus individual file flags.
fn build_config(args: &Args) -> anyhow::Result<FilterConfig> {
    let mut config = match &args.config {
        Some(path) => FilterConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => FilterConfig::default(),
    };
    config.blacklist_files.extend(args.blacklist_files.iter().cloned());
    config.pattern_files.extend(args.pattern_files.iter().cloned());
    config.context_files.extend(args.context_files.iter().cloned());
    Ok(config)
}

fn read_text(arg: Option<String>) -> anyhow::Result<String> {
    match arg {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading text from stdin")?;
            Ok(buf)
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = build_config(&args)?;
    // Rule-source errors are fatal here so misconfigurations surface
    // immediately instead of silently narrowing coverage.
    let pipeline = FilterPipeline::from_config(config).context("loading rule sources")?;
    tracing::debug!(rules = pipeline.rule_count(), "pipeline ready");

    match args.command {
        Command::Check { text } => {
            let text = read_text(text)?;
            let (ok, reply) = pipeline.check_input_safety(&text);
            println!("{reply}");
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(1) })
        }
        Command::Filter { text } => {
            let text = read_text(text)?;
            println!("{}", pipeline.filter_response_safety(&text));
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze { text } => {
            let text = read_text(text)?;
            let result = pipeline.analyze(&text);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Report => {
            let input = read_text(None)?;
            let results: Vec<_> = input
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| pipeline.analyze(line))
                .collect();
            let report = FilterReport::from_results(&results);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use keyprobe::{CancelToken, KeyProbe, Outcome, SearchConfig, Storage};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "keyprobe")]
#[command(
    version,
    about = "Recovers a keystore passphrase by testing every line of a wordlist."
)]
struct Cli {
    /// Path to the JSON keystore file
    keystore: PathBuf,

    /// Path to the wordlist, one candidate per line
    wordlist: PathBuf,

    /// Number of worker threads (default: hardware concurrency)
    #[arg(long, short = 't', env = "KEYPROBE_THREADS")]
    threads: Option<usize>,

    /// Log progress every N candidates (0 disables progress logging)
    #[arg(long, value_name = "N", default_value_t = 1000, env = "KEYPROBE_PROGRESS")]
    progress_every: u64,

    /// Log filter, e.g. `info` or `keyprobe=debug`
    #[arg(long, default_value = "info", env = "KEYPROBE_LOG")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let (filter, rejected) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, None),
        Err(e) => {
            // unset is fine; a value that does not parse is reported below
            let rejected = std::env::var(EnvFilter::DEFAULT_ENV)
                .ok()
                .map(|value| (value, e.to_string()));
            let filter = EnvFilter::try_new(level)
                .with_context(|| format!("invalid log filter '{level}'"))?;
            (filter, rejected)
        }
    };

    // stdout carries only the result
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    if let Some((value, reason)) = rejected {
        warn!(
            env = EnvFilter::DEFAULT_ENV,
            value = %value,
            reason = %reason,
            fallback = level,
            "ignoring invalid log filter from environment"
        );
    }
    Ok(())
}

fn run(args: Cli) -> Result<Outcome> {
    init_logging(&args.log_level, args.log_format)?;

    if args.threads == Some(0) {
        anyhow::bail!("--threads must be at least 1");
    }

    let probe = KeyProbe::open(&args.keystore)?;
    let words = Storage::new(args.wordlist).load_wordlist()?;
    if words.is_empty() {
        warn!("wordlist is empty");
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install Ctrl-C handler")?;

    let config = SearchConfig {
        threads: args.threads,
        progress_every: args.progress_every,
    };
    let report = probe.search(&words, &config, &cancel)?;
    info!(attempts = report.attempts, "search complete");

    println!("Run for {:?}", report.elapsed);
    match &report.outcome {
        Outcome::Found(password) => println!("Password: {password}"),
        Outcome::Exhausted => println!("No password found."),
        Outcome::Interrupted => println!("Search interrupted."),
    }
    Ok(report.outcome)
}

fn main() -> ExitCode {
    let args = Cli::parse();
    match run(args) {
        Ok(Outcome::Found(_)) => ExitCode::SUCCESS,
        Ok(Outcome::Exhausted) => ExitCode::from(1),
        Ok(Outcome::Interrupted) => ExitCode::from(130),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

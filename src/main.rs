//! Autopost CLI - generate one post, skip near-duplicates, publish

use autopost::ai::CliGenerator;
use autopost::config::expand_path;
use autopost::poster::PosterBackend;
use autopost::{Autopost, AutopostError, Config, Resolution};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Parser, Debug)]
#[command(name = "autopost")]
#[command(author = "Autopost Team")]
#[command(version)]
#[command(about = "Autopost - generate short social posts without repeating yourself", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.autopost/config.toml")]
    config: PathBuf,

    /// Initialize a new config file with defaults
    #[arg(long)]
    init: bool,

    /// Generate and log without publishing
    #[arg(long)]
    dry_run: bool,

    /// Override the prompt topic
    #[arg(short, long)]
    topic: Option<String>,

    /// Override the number of generator attempts
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Rebuild the history index from the preview log and exit
    #[arg(long)]
    rebuild_index: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Handle --init flag before anything touches the data dir
    let config_path = expand_path(&args.config);
    if args.init {
        init_logging(args.verbose, None);
        if config_path.exists() {
            tracing::warn!("Config file already exists: {}", config_path.display());
            return ExitCode::SUCCESS;
        }
        if let Err(e) = Config::create_default(&config_path) {
            tracing::error!("Failed to create config: {}", e);
            return exit_code(&e);
        }
        tracing::info!("Created default config at: {}", config_path.display());
        return ExitCode::SUCCESS;
    }

    // Load configuration
    let loaded = if config_path.exists() {
        Config::from_file(&config_path).map(Some)
    } else {
        Ok(None)
    };
    let mut config = match loaded {
        Ok(Some(config)) => config,
        Ok(None) => Config::default(),
        Err(e) => {
            init_logging(args.verbose, None);
            tracing::error!("Failed to load {}: {}", config_path.display(), e);
            return exit_code(&AutopostError::Config(e.to_string()));
        }
    };

    // Apply environment then CLI overrides
    config.apply_env_overrides();
    if args.dry_run {
        config.poster.dry_run = true;
    }
    if let Some(topic) = args.topic {
        config.prompt.topic = Some(topic);
    }
    if let Some(max_attempts) = args.max_attempts {
        config.generation.max_attempts = max_attempts;
    }

    let log_dir = config.logging.file.then(|| config.log_dir());
    let _guard = init_logging(args.verbose, log_dir);

    if !config_path.exists() {
        tracing::warn!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
    }

    // Returning (not exiting) lets the file writer guard flush the last lines
    match run(config, args.rebuild_index).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            exit_code(&e)
        }
    }
}

fn exit_code(e: &AutopostError) -> ExitCode {
    ExitCode::from(e.exit_code() as u8)
}

async fn run(config: Config, rebuild_index: bool) -> autopost::Result<()> {
    config.validate()?;

    let mut app = Autopost::new(config)?;

    if rebuild_index {
        let count = app.rebuild_index()?;
        tracing::info!("History index rebuilt with {} records", count);
        return Ok(());
    }

    let generator = CliGenerator::from_config(&app.config.ai).await?;
    let poster = PosterBackend::from_config(&app.config.poster)?;

    let report = app.run(&generator, &poster).await?;

    match report.outcome.resolution {
        Resolution::Accepted { attempt } => {
            tracing::info!("Accepted on attempt {}", attempt)
        }
        Resolution::Mutated => {
            tracing::info!(
                "No unique candidate after {} attempts; posted mutated text",
                report.outcome.attempts.len()
            )
        }
    }
    match &report.receipt.url {
        Some(url) => tracing::info!("Posted: {}", url),
        None if report.receipt.dry_run => tracing::info!("Dry run complete"),
        None => tracing::info!("Posted with id {}", report.receipt.post_id),
    }

    Ok(())
}

/// Install the tracing subscriber. With a log directory, a daily rolling file
/// layer is added; the returned guard must live until exit.
fn init_logging(verbose: bool, log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("autopost={}", log_level).into());

    let (file, guard) = match log_dir.map(|dir| file_layer(&dir)) {
        Some(Ok((layer, guard))) => (Some(layer), Some(guard)),
        Some(Err(e)) => {
            eprintln!("Failed to create log directory: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file)
        .init();

    guard
}

/// Daily rolling `autopost.log` under `dir`, written off-thread
fn file_layer<S>(dir: &Path) -> std::io::Result<(impl Layer<S>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, "autopost.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer);
    Ok((layer, guard))
}

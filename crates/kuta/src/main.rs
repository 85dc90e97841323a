//! Kuta - session and credential toolkit
//!
//! Main entry point for the Kuta CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*};

mod commands;

use commands::{config, demo, id, password, token};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Kuta - session tokens, password hashes and identifiers
#[derive(Parser)]
#[command(name = "kuta")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding the user config file
    #[arg(long, global = true, env = "KUTA_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a session token and its digest
    Token(token::TokenArgs),

    /// Check a token against a digest
    VerifyToken(token::VerifyTokenArgs),

    /// Hash a password with Argon2id
    HashPassword(password::HashPasswordArgs),

    /// Check a password against an encoded hash
    VerifyPassword(password::VerifyPasswordArgs),

    /// Generate random identifiers
    Id(id::IdArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Run a session lifecycle against in-memory storage
    Demo(demo::DemoArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = kuta_config::discover_config(cli.config_dir.as_deref(), None)
        .context("failed to load configuration")?;

    let _guard = init_tracing(&loaded.config, cli.verbose, cli.json)?;

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir: cli.config_dir,
        loaded,
    };

    // `config` must work on a broken config so it can be inspected and fixed.
    if !matches!(cli.command, Commands::Config(_)) {
        ctx.config()
            .validate()
            .context("invalid configuration")?;
    }

    match cli.command {
        Commands::Token(args) => token::run(args, &ctx).await,
        Commands::VerifyToken(args) => token::run_verify(args, &ctx).await,
        Commands::HashPassword(args) => password::run_hash(args, &ctx).await,
        Commands::VerifyPassword(args) => password::run_verify(args, &ctx).await,
        Commands::Id(args) => id::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
        Commands::Demo(args) => demo::run(args, &ctx).await,
    }
}

const KUTA_TARGETS: &[&str] = &["kuta", "kuta_session", "kuta_crypto", "kuta_config"];

fn target_filter(level: &str, default: &str) -> String {
    let mut directives: Vec<String> = KUTA_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    directives.push(default.to_string());
    directives.join(",")
}

/// Install the global subscriber: stderr always, daily JSON files when
/// `[logging] directory` is set. `RUST_LOG` overrides the console filter.
fn init_tracing(
    config: &kuta_config::KutaConfig,
    verbose: bool,
    json_output: bool,
) -> Result<Option<WorkerGuard>> {
    let console_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ if verbose => EnvFilter::new(target_filter("debug", "info")),
        _ => {
            let level = config.log_level().unwrap_or("info").to_ascii_lowercase();
            EnvFilter::new(target_filter(&level, "warn"))
        }
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    // Plain JSON lines keep `--json` stdout output machine-readable end to end.
    if config.log_json() || json_output {
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    let mut guard = None;
    if let Some(dir) = config.log_directory() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(dir, "kuta.log");
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new(target_filter("trace", "info")))
                .boxed(),
        );
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry().with(layers).init();
    Ok(guard)
}

//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use console::Style;
use kuta_config::KutaConfig;
use serde_json::json;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and where it came from
    Show,

    /// Show the user configuration file path
    Path,

    /// Write a config file with all defaults
    Init {
        /// Create project-local config (./kuta.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { local, force } => cmd_init(ctx, local, force),
    }
}

fn user_config_path(ctx: &Context) -> Option<PathBuf> {
    kuta_config::user_config_path(ctx.config_dir.as_deref())
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let effective = ctx.config().resolved();
    let validation = ctx.config().validate().err().map(|e| e.to_string());

    if ctx.json_output {
        let sources: Vec<_> = ctx
            .loaded
            .sources
            .iter()
            .map(|s| json!({ "path": s.path, "loaded": s.loaded }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "sources": sources,
                "warnings": ctx.loaded.warnings,
                "error": validation,
                "config": effective,
            }))?
        );
        return Ok(());
    }

    let dim = Style::new().dim();
    let yellow = Style::new().yellow();

    println!("# Kuta Configuration\n");

    println!("Config file search order (later overrides earlier):");
    for source in &ctx.loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }
    println!();

    if !ctx.loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &ctx.loaded.warnings {
            println!("  {} {}", yellow.apply_to("⚠"), w);
        }
        println!();
    }

    if let Some(error) = validation {
        println!("{} {}\n", Style::new().red().apply_to("Invalid:"), error);
    }

    println!("{}", dim.apply_to("# Effective settings"));
    print!("{}", effective.to_toml()?);
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let path =
        user_config_path(ctx).ok_or_else(|| anyhow!("Could not determine config directory"))?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "path": path,
                "exists": path.is_file(),
            }))?
        );
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_init(ctx: &Context, local: bool, force: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("kuta.toml")
    } else {
        user_config_path(ctx).ok_or_else(|| anyhow!("Could not determine config directory"))?
    };

    if path.exists() && !force {
        println!("Config file already exists: {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    kuta_config::write_config_file(&KutaConfig::with_defaults(), &path)?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "created": path }))?
        );
    } else {
        println!(
            "{} {}",
            Style::new().green().apply_to("Created"),
            path.display()
        );
    }
    Ok(())
}

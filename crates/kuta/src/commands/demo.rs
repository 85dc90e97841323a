//! Demo command - walk one session through its whole lifecycle.
//!
//! Uses the in-memory storage and cache, so nothing persists.

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;
use console::Style;
use kuta_session::{MemoryCache, MemoryStorage, SessionError, SessionManager};
use serde_json::json;

use super::Context;

/// Arguments for the demo command.
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// User the demo session belongs to
    #[arg(short, long, default_value = "demo-user")]
    pub user: String,

    /// Client IP address recorded on the session
    #[arg(long, default_value = "127.0.0.1")]
    pub ip: String,

    /// Client user agent recorded on the session
    #[arg(long, default_value = "kuta-cli")]
    pub user_agent: String,
}

/// Run the demo command.
pub async fn run(args: DemoArgs, ctx: &Context) -> Result<()> {
    let config = ctx.config();
    let storage = Arc::new(MemoryStorage::new());
    let mut manager = SessionManager::new(config.session_config(), storage.clone())
        .with_id_generator(config.id_generator()?);

    let cache = config.cache_config().map(MemoryCache::new);
    if let Some(cache) = &cache {
        manager = manager.with_cache(Arc::new(cache.clone()));
    }

    let mut steps = Vec::new();
    let mut step = |name: &str, detail: String| {
        if !ctx.json_output {
            println!(
                "{} {:<22} {}",
                Style::new().green().apply_to("✓"),
                name,
                Style::new().dim().apply_to(&detail)
            );
        }
        steps.push(json!({ "step": name, "detail": detail }));
    };

    let created = manager
        .create(&args.user, &args.ip, &args.user_agent)
        .await?;
    step(
        "create",
        format!(
            "session {} expires {}",
            created.session.id, created.session.expires_at
        ),
    );

    let verified = manager.verify(&created.token).await?;
    step("verify", format!("user {}", verified.user_id));

    let refreshed = manager.refresh(&created.token).await?;
    step(
        "refresh",
        format!("session {} replaces {}", refreshed.session.id, created.session.id),
    );

    match manager.verify(&created.token).await {
        Err(SessionError::NotFound) => step("verify old token", "rejected".to_string()),
        Ok(_) => bail!("old token still verifies after refresh"),
        Err(e) => return Err(e.into()),
    }

    let active = manager.list_user_sessions(&args.user).await?;
    step("list", format!("{} active session(s)", active.len()));

    manager.destroy(&refreshed.token).await?;
    step("destroy", format!("session {}", refreshed.session.id));

    match manager.verify(&refreshed.token).await {
        Err(SessionError::NotFound) => step("verify after destroy", "rejected".to_string()),
        Ok(_) => bail!("token still verifies after destroy"),
        Err(e) => return Err(e.into()),
    }

    let stats = match &cache {
        Some(cache) => Some(cache.stats().await),
        None => None,
    };

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "steps": steps,
                "stored_sessions": storage.len(),
                "cache": stats,
            }))?
        );
        return Ok(());
    }

    println!();
    match stats {
        Some(stats) => {
            println!("Cache:");
            println!("  hits:      {}", stats.hits);
            println!("  misses:    {}", stats.misses);
            println!("  sets:      {}", stats.sets);
            println!("  deletes:   {}", stats.deletes);
            println!("  evictions: {}", stats.evictions);
            println!("  size:      {}", stats.size);
            if ctx.verbose {
                println!("  ttl:       {}s", stats.ttl.as_secs());
            }
        }
        None => println!("Cache: disabled"),
    }
    Ok(())
}

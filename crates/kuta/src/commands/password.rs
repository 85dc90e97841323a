//! Password commands - Argon2id hashing and verification.
//!
//! Hashing is CPU and memory heavy, so it runs on the blocking pool.

use anyhow::{Context as _, Result, bail};
use clap::Args;
use kuta_crypto::PasswordHasher;
use serde_json::json;
use tracing::debug;

use super::{Context, read_secret};
use crate::commands::token::print_verdict;

/// Arguments for the hash-password command.
#[derive(Args, Debug)]
pub struct HashPasswordArgs {
    /// Password to hash (prompted or read from stdin when omitted)
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Arguments for the verify-password command.
#[derive(Args, Debug)]
pub struct VerifyPasswordArgs {
    /// Encoded hash ($argon2id$v=19$...)
    pub hash: String,

    /// Password to check (prompted or read from stdin when omitted)
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Run the hash-password command.
pub async fn run_hash(args: HashPasswordArgs, ctx: &Context) -> Result<()> {
    let password = read_secret(args.password, "Password: ")?;
    let params = ctx.config().argon2_params();
    debug!(
        memory_kib = params.memory_kib,
        iterations = params.iterations,
        parallelism = params.parallelism,
        "hashing password"
    );

    let hasher = PasswordHasher::with_params(params);
    let encoded = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .context("hashing task failed")??;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "hash": encoded }))?
        );
    } else {
        println!("{}", encoded);
    }
    Ok(())
}

/// Run the verify-password command. Exits non-zero on mismatch.
pub async fn run_verify(args: VerifyPasswordArgs, ctx: &Context) -> Result<()> {
    let password = read_secret(args.password, "Password: ")?;
    let encoded = args.hash;

    // Verification uses the parameters embedded in the hash.
    let hasher = PasswordHasher::new();
    let valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &encoded))
        .await
        .context("verification task failed")??;

    print_verdict(valid, ctx)?;
    if !valid {
        bail!("password does not match hash");
    }
    Ok(())
}

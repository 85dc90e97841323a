//! Token commands - issue and check session tokens.

use anyhow::{Result, bail};
use clap::Args;
use console::Style;
use serde_json::json;

use super::Context;

/// Arguments for the token command.
#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Random bytes in the token (default from config, 32)
    #[arg(short, long)]
    pub bytes: Option<usize>,
}

/// Arguments for the verify-token command.
#[derive(Args, Debug)]
pub struct VerifyTokenArgs {
    /// The raw token
    pub token: String,

    /// The hex SHA-256 digest to check against
    pub digest: String,
}

/// Run the token command.
pub async fn run(args: TokenArgs, ctx: &Context) -> Result<()> {
    let bytes = args
        .bytes
        .unwrap_or_else(|| ctx.config().session_config().token_bytes);
    let pair = kuta_crypto::generate_hashed_token(bytes)?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "token": pair.token,
                "hash": pair.hash,
            }))?
        );
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{} {}", dim.apply_to("token: "), pair.token);
    println!("{} {}", dim.apply_to("digest:"), pair.hash);
    if ctx.verbose {
        println!();
        println!(
            "{}",
            dim.apply_to("Give the token to the client; store only the digest.")
        );
    }
    Ok(())
}

/// Run the verify-token command. Exits non-zero on mismatch.
pub async fn run_verify(args: VerifyTokenArgs, ctx: &Context) -> Result<()> {
    let valid = kuta_crypto::verify_token(&args.token, &args.digest)?;
    print_verdict(valid, ctx)?;
    if !valid {
        bail!("token does not match digest");
    }
    Ok(())
}

/// Print "valid"/"invalid", styled or as JSON.
pub(crate) fn print_verdict(valid: bool, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "valid": valid }))?);
    } else if valid {
        println!("{}", Style::new().green().apply_to("valid"));
    } else {
        println!("{}", Style::new().red().apply_to("invalid"));
    }
    Ok(())
}

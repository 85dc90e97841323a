//! Id command - random identifiers.

use anyhow::{Result, bail};
use clap::Args;
use kuta_crypto::NanoId;

use super::Context;

/// Arguments for the id command.
#[derive(Args, Debug)]
pub struct IdArgs {
    /// Identifier length (default from config, 22)
    #[arg(short, long)]
    pub length: Option<usize>,

    /// Alphabet to draw from (default from config)
    #[arg(short, long)]
    pub alphabet: Option<String>,

    /// How many identifiers to print
    #[arg(short, long, default_value_t = 1)]
    pub count: usize,
}

/// Run the id command.
pub async fn run(args: IdArgs, ctx: &Context) -> Result<()> {
    if args.count == 0 {
        bail!("--count must be at least 1");
    }

    let generator = match &args.alphabet {
        Some(alphabet) => NanoId::with_alphabet(alphabet)?,
        None => ctx.config().id_generator()?,
    };
    let length = args
        .length
        .unwrap_or_else(|| ctx.config().identifier_length());

    let ids = (0..args.count)
        .map(|_| generator.generate(Some(length)))
        .collect::<kuta_crypto::Result<Vec<_>>>()?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&ids)?);
    } else {
        for id in ids {
            println!("{}", id);
        }
    }
    Ok(())
}

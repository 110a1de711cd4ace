//! The `get` command: print a value.

use anyhow::{Context as _, Result};
use clap::Args;

use crate::backend::{Backend as _, GetOptions, Ref};

use super::AppContext;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Target ref (e.g. ps:/app/prod/DB_HOST, sm:secret-id)
    pub target: String,

    /// Force raw output (ignore the cli-store-mode tag)
    #[arg(long)]
    pub raw: bool,

    /// Force JSON decode output
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &AppContext, args: GetArgs) -> Result<()> {
    let value = fetch(ctx, &args).await?;
    println!("{value}");
    Ok(())
}

async fn fetch(ctx: &AppContext, args: &GetArgs) -> Result<String> {
    let target = Ref::parse(&args.target).context("get command failed: invalid ref")?;

    let backend = ctx
        .backends
        .backend(target.kind)
        .await
        .context("get command failed: create backend")?;

    let opts = GetOptions {
        force_raw: args.raw,
        force_json: args.json,
    };

    backend
        .get(&target, opts)
        .await
        .context("get command failed")
}

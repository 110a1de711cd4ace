//! The `put` command: store a value.

use anyhow::{Context as _, Result};
use clap::Args;

use crate::backend::{Backend as _, PutOptions, Ref};
use crate::tags::StoreMode;

use super::AppContext;

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Target ref (e.g. ps:/app/prod/DB_HOST, sm:secret-id)
    pub target: String,

    /// Value to store
    #[arg(short = 'v', long)]
    pub value: String,

    /// Storage mode
    #[arg(short = 's', long, value_enum, default_value = "raw")]
    pub store: StoreMode,

    /// Use SecureString (SSM Parameter Store only)
    #[arg(long)]
    pub secure: bool,
}

pub async fn run(ctx: &AppContext, args: PutArgs) -> Result<()> {
    let target = Ref::parse(&args.target).context("put command failed: invalid ref")?;

    let backend = ctx
        .backends
        .backend(target.kind)
        .await
        .context("put command failed: create backend")?;

    let opts = PutOptions {
        value: args.value,
        store_mode: args.store,
        secure: args.secure,
        kms_key_id: ctx.config.aws.kms_key_id.clone(),
    };

    backend
        .put(&target, opts)
        .await
        .context("put command failed")?;

    println!("OK");
    Ok(())
}

//! The `ls` command: list refs under a prefix.

use anyhow::{Context as _, Result, bail};
use clap::Args;

use crate::backend::{Backend as _, BackendKind, ParameterEntry, Ref};

use super::AppContext;

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Source prefix (e.g. ps:/app/prod/)
    pub from: String,

    /// List only direct children
    #[arg(long = "no-recursive")]
    pub no_recursive: bool,
}

pub async fn run(ctx: &AppContext, args: LsArgs) -> Result<()> {
    for line in list(ctx, &args).await? {
        println!("{line}");
    }
    Ok(())
}

async fn list(ctx: &AppContext, args: &LsArgs) -> Result<Vec<String>> {
    let parsed = Ref::parse(&args.from).context("ls command failed: invalid ref")?;

    if parsed.kind == BackendKind::Sm {
        bail!("ls command failed: sm: backend is not supported (use ps: or psa:)");
    }

    let backend = ctx
        .backends
        .backend(parsed.kind)
        .await
        .context("ls command failed: create backend")?;

    let entries = backend
        .list_by_prefix(&parsed.path, !args.no_recursive)
        .await
        .context("ls command failed")?;

    Ok(to_sorted_refs(parsed.kind, &entries))
}

fn to_sorted_refs(kind: BackendKind, entries: &[ParameterEntry]) -> Vec<String> {
    let mut refs: Vec<String> = entries
        .iter()
        .map(|entry| format!("{kind}:{}", entry.path))
        .collect();
    refs.sort();
    refs
}

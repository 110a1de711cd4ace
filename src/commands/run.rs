//! The `run` command: execute a command with parameters injected into its environment.

use std::collections::BTreeMap;
use std::process::Command;

use anyhow::{Context as _, Result, bail};
use clap::Args;

use super::{AppContext, ExitCodeError, FlattenFlags, build_vars};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Source prefixes (e.g. ps:/app/prod/); later entries take precedence
    #[arg(short = 'f', long = "from")]
    pub from: Vec<String>,

    #[command(flatten)]
    pub flatten: FlattenFlags,

    /// Command and arguments to run
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Executes a subprocess with extra environment variables. Abstracted so the
/// command logic is testable without forking.
pub trait CommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        vars: &BTreeMap<String, String>,
    ) -> Result<i32>;
}

/// Production runner: inherits stdio and the parent environment, overlaying
/// the fetched variables.
pub struct OsRunner;

impl CommandRunner for OsRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        vars: &BTreeMap<String, String>,
    ) -> Result<i32> {
        let status = Command::new(program)
            .args(args)
            .envs(vars)
            .status()
            .with_context(|| format!("failed to execute {program:?}"))?;
        Ok(status.code().unwrap_or(1))
    }
}

pub async fn run(ctx: &AppContext, args: RunArgs) -> Result<()> {
    run_with(ctx, args, &OsRunner).await
}

pub(crate) async fn run_with(
    ctx: &AppContext,
    args: RunArgs,
    runner: &dyn CommandRunner,
) -> Result<()> {
    if args.command.is_empty() {
        bail!("run command failed: no command specified");
    }

    let mut vars = BTreeMap::new();
    for from in &args.from {
        let fetched = build_vars(ctx, from, &args.flatten)
            .await
            .context("run command failed")?;
        vars.extend(fetched);
    }

    let code = runner
        .run(&args.command[0], &args.command[1..], &vars)
        .context("run command failed")?;

    if code != 0 {
        return Err(ExitCodeError(code).into());
    }
    Ok(())
}

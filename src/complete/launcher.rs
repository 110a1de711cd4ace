//! Fire-and-forget launching of background refresh subprocesses.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

/// Environment variables with this prefix identify a shell-completion
/// request. A refresh child that inherited them would answer the completion
/// instead of refreshing, so the launcher strips them.
const COMPLETION_ENV_PREFIX: &str = "COMP_";

/// Starts background work without waiting for it.
pub trait BackgroundLauncher: Send + Sync {
    /// Spawns the program with `args`, detached. A successful return means
    /// the process started, not that it succeeded.
    fn launch(&self, args: &[&str]) -> io::Result<()>;
}

/// Production launcher: re-invokes this binary as a detached child with all
/// three stdio streams discarded.
#[derive(Debug)]
pub struct ExecLauncher {
    program: PathBuf,
}

impl ExecLauncher {
    /// Uses the invoking binary itself as the child program.
    pub fn new() -> Self {
        let program = env::args_os()
            .next()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("bundr"));
        Self { program }
    }

    /// Overrides the child program. Used by tests.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ExecLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundLauncher for ExecLauncher {
    fn launch(&self, args: &[&str]) -> io::Result<()> {
        let child = Command::new(&self.program)
            .args(args)
            .env_clear()
            .envs(sanitized_env(env::vars_os()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        debug!(pid = child.id(), program = %self.program.display(), "spawned background refresh");
        // Dropping the handle detaches the child; nobody waits on it.
        Ok(())
    }
}

/// Filters out every `COMP_*` variable from an environment snapshot.
fn sanitized_env<I>(vars: I) -> Vec<(OsString, OsString)>
where
    I: Iterator<Item = (OsString, OsString)>,
{
    vars.filter(|(name, _)| {
        !name
            .to_string_lossy()
            .starts_with(COMPLETION_ENV_PREFIX)
    })
    .collect()
}

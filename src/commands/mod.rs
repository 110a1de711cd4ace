//! Command implementations.
//!
//! Each submodule owns one subcommand: its clap `Args` struct and an async
//! `run` function over the shared [`AppContext`].

pub mod cache;
pub mod completion;
pub mod describe;
pub mod export;
pub mod get;
pub mod jsonize;
pub mod ls;
pub mod put;
pub mod run;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use thiserror::Error;

use crate::backend::{Backend as _, BackendKind, BackendProvider, GetOptions, Ref};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::flatten::{self, ArrayMode};

/// Shared dependencies injected into every command.
pub struct AppContext {
    pub config: Config,
    pub backends: Arc<dyn BackendProvider>,
    pub cache: Arc<dyn CacheStore>,
}

/// Carries a child process exit code up to `main`.
#[derive(Debug, Error)]
#[error("exit status {0}")]
pub struct ExitCodeError(pub i32);

/// Flags shared by the commands that turn parameters into variables.
#[derive(Args, Debug, Clone)]
pub struct FlattenFlags {
    /// Disable JSON flattening
    #[arg(long = "no-flatten")]
    pub no_flatten: bool,

    /// Array handling mode
    #[arg(long = "array-mode", value_enum, default_value = "join")]
    pub array_mode: ArrayMode,

    /// Delimiter for array join mode
    #[arg(long = "array-join-delim", default_value = ",")]
    pub array_join_delim: String,

    /// Delimiter for flattened keys
    #[arg(long = "flatten-delim", default_value = "_")]
    pub flatten_delim: String,

    /// Keep key names lowercase instead of uppercasing them
    #[arg(long = "no-upper")]
    pub no_upper: bool,
}

impl FlattenFlags {
    pub fn to_options(&self) -> flatten::Options {
        flatten::Options {
            delimiter: self.flatten_delim.clone(),
            array_mode: self.array_mode,
            array_join_delim: self.array_join_delim.clone(),
            upper: !self.no_upper,
            no_flatten: self.no_flatten,
        }
    }
}

/// Fetches every parameter under `from` and returns the flattened
/// key-to-value map. Used by `export` and `run`.
pub(crate) async fn build_vars(
    ctx: &AppContext,
    from: &str,
    flags: &FlattenFlags,
) -> Result<BTreeMap<String, String>> {
    let parsed = Ref::parse(from).context("invalid ref")?;

    if parsed.kind == BackendKind::Sm {
        bail!("sm: backend is not supported (use ps: or psa:)");
    }

    let backend = ctx
        .backends
        .backend(parsed.kind)
        .await
        .context("create backend")?;

    let entries = backend.list_by_prefix(&parsed.path, true).await?;
    let opts = flags.to_options();
    let mut vars = BTreeMap::new();

    // A leaf path matches nothing as a prefix; fall back to a single get.
    if entries.is_empty() && !parsed.path.ends_with('/') {
        let value = backend.get(&parsed, GetOptions::default()).await?;
        let key_name = parsed.path.rsplit('/').next().unwrap_or(&parsed.path);
        let key = flatten::apply_casing(key_name, &opts).replace('.', &flags.flatten_delim);
        vars.insert(key, value);
        return Ok(vars);
    }

    for entry in entries {
        let key_prefix = path_to_key(&entry.path, &parsed.path, &flags.flatten_delim);

        if entry.store_mode == crate::tags::StoreMode::Json && !flags.no_flatten {
            for (key, value) in flatten::flatten(&key_prefix, &entry.value, &opts) {
                vars.insert(key.replace('.', &flags.flatten_delim), value);
            }
        } else {
            let key = flatten::apply_casing(&key_prefix, &opts).replace('.', &flags.flatten_delim);
            vars.insert(key, entry.value);
        }
    }

    Ok(vars)
}

/// Converts a parameter path to a key name by trimming the `from` prefix and
/// turning the remaining separators into the delimiter.
pub(crate) fn path_to_key(path: &str, from_path: &str, delimiter: &str) -> String {
    let base = format!("{}/", from_path.trim_end_matches('/'));
    let trimmed = path.strip_prefix(&base).unwrap_or(path);
    trimmed.replace('/', delimiter)
}

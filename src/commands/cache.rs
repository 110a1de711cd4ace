//! The `cache refresh` command: repopulate the completion cache from a backend.
//!
//! This is the subcommand the background launcher fires; it also works when
//! invoked by hand. Only paths and storage modes reach the cache file.

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};

use crate::backend::{Backend as _, BackendKind, Ref};
use crate::cache::{CacheEntry, CacheStore as _};

use super::AppContext;

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Refresh the local cache by fetching paths from AWS
    Refresh(RefreshArgs),
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Prefix to refresh (e.g. ps:/app/prod/)
    #[arg(long)]
    pub prefix: String,
}

pub async fn run(ctx: &AppContext, command: CacheCommands) -> Result<()> {
    match command {
        CacheCommands::Refresh(args) => refresh(ctx, args).await,
    }
}

pub async fn refresh(ctx: &AppContext, args: RefreshArgs) -> Result<()> {
    let parsed = Ref::parse(&args.prefix).context("cache refresh: invalid prefix")?;

    if parsed.kind == BackendKind::Sm {
        bail!("cache refresh: sm: backend is not supported for completion cache");
    }

    let backend = ctx
        .backends
        .backend(parsed.kind)
        .await
        .context("cache refresh: create backend")?;

    let listed = backend
        .list_by_prefix(&parsed.path, true)
        .await
        .context("cache refresh: fetch parameters")?;

    let entries: Vec<CacheEntry> = listed
        .into_iter()
        .map(|entry| CacheEntry {
            path: entry.path,
            store_mode: entry.store_mode,
        })
        .collect();

    ctx.cache
        .write(parsed.kind.short(), &entries)
        .context("cache refresh: write cache")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::mock::{MockBackend, MockProvider};
    use crate::cache::{CacheStore, FileStore};
    use crate::commands::testutil::test_context;
    use crate::config::Config;
    use crate::tags::StoreMode;

    fn file_context(backend: Arc<MockBackend>, dir: &std::path::Path) -> AppContext {
        AppContext {
            config: Config::default(),
            backends: Arc::new(MockProvider::new(backend)),
            cache: Arc::new(FileStore::with_dir(dir)),
        }
    }

    #[tokio::test]
    async fn populates_cache_with_paths_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::new());
        backend.seed("ps:/app/prod/DB_HOST", "example.com", StoreMode::Raw);
        backend.seed("ps:/app/prod/DB_PASSWORD", "hunter2", StoreMode::Raw);
        let ctx = file_context(Arc::clone(&backend), dir.path());

        refresh(
            &ctx,
            RefreshArgs {
                prefix: "ps:/app".to_string(),
            },
        )
        .await
        .unwrap();

        // Listing is recursive.
        assert_eq!(backend.list_calls(), vec![("/app".to_string(), true)]);

        let entries = ctx.cache.read("ps").unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/app/prod/DB_HOST"));
        assert!(paths.contains(&"/app/prod/DB_PASSWORD"));

        // The secret value must not appear anywhere in the document.
        let raw = std::fs::read_to_string(dir.path().join("ps.json")).unwrap();
        assert!(!raw.contains("hunter2"));
        assert!(!raw.contains("example.com"));
        assert!(!raw.contains("\"value\""));
    }

    #[tokio::test]
    async fn rejects_secrets_prefix() {
        let ctx = test_context(Arc::new(MockBackend::new()));
        let err = refresh(
            &ctx,
            RefreshArgs {
                prefix: "sm:prod/key".to_string(),
            },
        )
        .await
        .unwrap_err();

        assert!(
            err.to_string()
                .contains("sm: backend is not supported for completion cache")
        );
    }

    #[tokio::test]
    async fn rejects_invalid_prefix() {
        let ctx = test_context(Arc::new(MockBackend::new()));
        let err = refresh(
            &ctx,
            RefreshArgs {
                prefix: "bogus".to_string(),
            },
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("invalid prefix"));
    }

    #[tokio::test]
    async fn backend_failure_leaves_no_cache_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::new());
        let provider = MockProvider::new(Arc::clone(&backend));
        provider.fail_with("ssm unavailable");
        let ctx = AppContext {
            config: Config::default(),
            backends: Arc::new(provider),
            cache: Arc::new(FileStore::with_dir(dir.path())),
        };

        let err = refresh(
            &ctx,
            RefreshArgs {
                prefix: "ps:/app".to_string(),
            },
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("create backend"));
        assert!(!dir.path().join("ps.json").exists());
    }
}

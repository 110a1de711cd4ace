//! Completion predictors.
//!
//! Both predictors map a partial input string to candidate strings using only
//! the local cache, and kick off a detached background refresh when the cache
//! is missing or stale. They never block on the network and never fail: any
//! internal error degrades to an empty candidate list.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::backend::reference::{BackendKind, Ref};
use crate::cache::{CacheError, CacheStore};
use crate::complete::launcher::BackgroundLauncher;

/// Minimum interval between consecutive background refreshes per backend.
const REFRESH_THROTTLE_SECS: i64 = 10;

/// Completes a ref to a specific entry (`ps:/...`, `psa:/...`, `sm:...`).
///
/// A cache miss returns no candidates and unconditionally launches a refresh;
/// a hit additionally launches one when the cache is older than the throttle
/// window.
pub fn ref_candidates(
    input: &str,
    store: &dyn CacheStore,
    launcher: &dyn BackgroundLauncher,
) -> Vec<String> {
    let Ok(parsed) = Ref::parse(input) else {
        return Vec::new();
    };

    // Secrets Manager has no prefix listing, so completion is meaningless.
    if !parsed.kind.supports_prefix_listing() {
        return Vec::new();
    }

    let backend = parsed.kind.short();
    let entries = match store.read(backend) {
        Ok(entries) => entries,
        Err(CacheError::NotFound) => {
            launch_refresh(launcher, input);
            return Vec::new();
        }
        Err(err) => {
            warn!(backend, error = %err, "cache read failed");
            return Vec::new();
        }
    };

    let candidates: Vec<String> = entries
        .iter()
        .filter(|entry| entry.path.starts_with(&parsed.path))
        .map(|entry| format!("{backend}:{}", entry.path))
        .collect();

    if refresh_due(store.last_refreshed_at(backend)) {
        launch_refresh(launcher, input);
    }

    candidates
}

/// Completes a `--from` style prefix that may span backends.
///
/// With empty input, candidates from every listable backend's cache are
/// returned together, and each backend's refresh state is handled
/// independently: missing caches get an immediate root refresh, present ones
/// a throttled root refresh. Non-empty input behaves like [`ref_candidates`].
pub fn prefix_candidates(
    input: &str,
    store: &dyn CacheStore,
    launcher: &dyn BackgroundLauncher,
) -> Vec<String> {
    if !input.is_empty() {
        return ref_candidates(input, store, launcher);
    }

    let mut candidates = Vec::new();
    for kind in [BackendKind::Ps, BackendKind::Psa] {
        let backend = kind.short();
        let root = format!("{backend}:/");
        match store.read(backend) {
            Ok(entries) => {
                candidates.extend(
                    entries
                        .iter()
                        .map(|entry| format!("{backend}:{}", entry.path)),
                );
                if refresh_due(store.last_refreshed_at(backend)) {
                    launch_refresh(launcher, &root);
                }
            }
            Err(CacheError::NotFound) => launch_refresh(launcher, &root),
            Err(err) => warn!(backend, error = %err, "cache read failed"),
        }
    }
    candidates
}

fn refresh_due(last_refreshed_at: DateTime<Utc>) -> bool {
    Utc::now().signed_duration_since(last_refreshed_at)
        > TimeDelta::seconds(REFRESH_THROTTLE_SECS)
}

fn launch_refresh(launcher: &dyn BackgroundLauncher, prefix: &str) {
    if let Err(err) = launcher.launch(&["cache", "refresh", "--prefix", prefix]) {
        // Completion must not fail over a refresh that could not start.
        debug!(error = %err, "background refresh launch failed");
    }
}

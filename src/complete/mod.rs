//! Interactive shell completion.
//!
//! The binary registers itself as its own completer (`complete -C`). When the
//! shell asks for candidates it re-invokes the binary with `COMP_LINE` set in
//! the environment; this module detects that, routes the word being completed
//! to a predictor, prints one candidate per line, and returns without ever
//! touching the normal argument parser.

pub mod launcher;
pub mod predictor;

use std::env;

use crate::cache::CacheStore;

pub use launcher::{BackgroundLauncher, ExecLauncher};
pub use predictor::{prefix_candidates, ref_candidates};

/// Environment variable carrying the command line being completed.
pub const COMP_LINE_VAR: &str = "COMP_LINE";

/// Subcommands offered when the first word is being completed.
const SUBCOMMANDS: &[&str] = &[
    "put",
    "get",
    "ls",
    "describe",
    "export",
    "run",
    "jsonize",
    "cache",
    "completion",
];

/// Whether this process was invoked as a completion callback.
pub fn completion_requested() -> bool {
    env::var_os(COMP_LINE_VAR).is_some()
}

/// Answers the completion request on stdout.
pub fn run_completion(store: &dyn CacheStore, launcher: &dyn BackgroundLauncher) {
    let line = env::var(COMP_LINE_VAR).unwrap_or_default();
    for candidate in complete_line(&line, store, launcher) {
        println!("{candidate}");
    }
}

/// Produces candidates for a raw `COMP_LINE`.
fn complete_line(
    line: &str,
    store: &dyn CacheStore,
    launcher: &dyn BackgroundLauncher,
) -> Vec<String> {
    let (prior, current) = split_line(line);

    // Flags themselves are not completed.
    if current.starts_with('-') {
        return Vec::new();
    }

    // prior[0] is the program name; the words after it give the context.
    let words = prior.get(1..).unwrap_or_default();

    if let Some(previous) = words.last() {
        match previous.as_str() {
            "--from" | "-f" | "--frompath" => return prefix_candidates(&current, store, launcher),
            "--to" => return ref_candidates(&current, store, launcher),
            _ => {}
        }
    }

    match words.first().map(String::as_str) {
        None => SUBCOMMANDS
            .iter()
            .filter(|name| name.starts_with(&current))
            .map(|name| (*name).to_string())
            .collect(),
        Some("put" | "get" | "describe") => ref_candidates(&current, store, launcher),
        Some("export" | "ls") => prefix_candidates(&current, store, launcher),
        Some(_) => Vec::new(),
    }
}

/// Splits a command line into completed words and the word being completed.
/// A line ending in whitespace means the cursor sits on a fresh empty word.
fn split_line(line: &str) -> (Vec<String>, String) {
    let mut words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    let current = if line.ends_with(char::is_whitespace) || words.is_empty() {
        String::new()
    } else {
        words.pop().unwrap_or_default()
    };
    (words, current)
}

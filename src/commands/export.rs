//! The `export` command: print parameters as environment variable assignments.

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};

use super::{AppContext, FlattenFlags, build_vars};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Shell,
    Dotenv,
    Direnv,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Source prefix (e.g. ps:/app/prod/)
    pub from: String,

    /// Output format
    #[arg(long, value_enum, default_value = "shell")]
    pub format: ExportFormat,

    #[command(flatten)]
    pub flatten: FlattenFlags,
}

pub async fn run(ctx: &AppContext, args: ExportArgs) -> Result<()> {
    let vars = build_vars(ctx, &args.from, &args.flatten)
        .await
        .context("export command failed")?;

    for (key, value) in &vars {
        println!("{}", format_line(args.format, key, value));
    }
    Ok(())
}

fn format_line(format: ExportFormat, key: &str, value: &str) -> String {
    match format {
        ExportFormat::Shell | ExportFormat::Direnv => {
            format!("export {key}={}", shell_quote(value))
        }
        ExportFormat::Dotenv => format!("{key}={}", dotenv_quote(value)),
    }
}

/// Single-quotes a value, escaping embedded single quotes.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

/// Dotenv values are written bare unless they contain characters that need
/// quoting.
fn dotenv_quote(value: &str) -> String {
    if !needs_dotenv_quote(value) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn needs_dotenv_quote(value: &str) -> bool {
    value
        .chars()
        .any(|c| matches!(c, ' ' | '\t' | '\n' | '"' | '\'' | '\\' | '#'))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::commands::testutil::{default_flatten_flags, test_context};
    use crate::tags::StoreMode;

    #[test]
    fn shell_lines_are_single_quoted() {
        assert_eq!(
            format_line(ExportFormat::Shell, "DB_HOST", "example.com"),
            "export DB_HOST='example.com'"
        );
        assert_eq!(
            format_line(ExportFormat::Shell, "MSG", "it's here"),
            "export MSG='it'\"'\"'s here'"
        );
    }

    #[test]
    fn direnv_matches_shell_format() {
        assert_eq!(
            format_line(ExportFormat::Direnv, "A", "b"),
            "export A='b'"
        );
    }

    #[test]
    fn dotenv_quotes_only_when_needed() {
        assert_eq!(format_line(ExportFormat::Dotenv, "A", "plain"), "A=plain");
        assert_eq!(
            format_line(ExportFormat::Dotenv, "A", "has space"),
            "A=\"has space\""
        );
        assert_eq!(
            format_line(ExportFormat::Dotenv, "A", "say \"hi\""),
            "A=\"say \\\"hi\\\"\""
        );
        assert_eq!(
            format_line(ExportFormat::Dotenv, "A", "back\\slash"),
            "A=\"back\\\\slash\""
        );
        assert_eq!(
            format_line(ExportFormat::Dotenv, "A", "hash#tag"),
            "A=\"hash#tag\""
        );
    }

    #[tokio::test]
    async fn export_resolves_and_flattens_vars() {
        let backend = Arc::new(MockBackend::new());
        backend.seed("ps:/app/prod/DB_HOST", "example.com", StoreMode::Raw);
        backend.seed("ps:/app/prod/cfg", r#"{"debug":true}"#, StoreMode::Json);
        let ctx = test_context(backend);

        let vars = build_vars(&ctx, "ps:/app/prod", &default_flatten_flags())
            .await
            .unwrap();

        let lines: Vec<String> = vars
            .iter()
            .map(|(k, v)| format_line(ExportFormat::Shell, k, v))
            .collect();

        assert_eq!(
            lines,
            vec![
                "export CFG_DEBUG='true'",
                "export DB_HOST='example.com'",
            ]
        );
    }
}

pub mod backend;
pub mod cache;
pub mod commands;
pub mod complete;
pub mod config;
pub mod flatten;
pub mod jsonize;
pub mod tags;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use backend::AwsBackendProvider;
use cache::{CacheStore, FileStore, NoopStore};
use commands::AppContext;
use complete::ExecLauncher;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "bundr",
    version,
    about = "Manage parameter and secret values in AWS backends"
)]
pub struct Cli {
    /// AWS region override
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// AWS profile override
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// KMS key for SecureString values
    #[arg(long = "kms-key-id", global = true)]
    pub kms_key_id: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a value to Parameter Store or Secrets Manager
    Put(commands::put::PutArgs),
    /// Get a value from a backend
    Get(commands::get::GetArgs),
    /// List refs under a prefix
    Ls(commands::ls::LsArgs),
    /// Show metadata for a key
    Describe(commands::describe::DescribeArgs),
    /// Export parameters as environment variables
    Export(commands::export::ExportArgs),
    /// Run a command with parameters injected into its environment
    Run(commands::run::RunArgs),
    /// Build a nested JSON document from parameter paths
    Jsonize(commands::jsonize::JsonizeArgs),
    /// Completion cache maintenance
    Cache {
        #[command(subcommand)]
        command: commands::cache::CacheCommands,
    },
    /// Print the shell completion setup snippet
    Completion(commands::completion::CompletionArgs),
}

pub async fn run() -> Result<()> {
    init_tracing();

    let cache_store = build_cache_store();

    // A completion callback never reaches the argument parser: answer it and
    // leave. The launcher re-invokes this same binary for refreshes.
    if complete::completion_requested() {
        let launcher = ExecLauncher::new();
        complete::run_completion(cache_store.as_ref(), &launcher);
        return Ok(());
    }

    let cli = Cli::parse();

    let mut config = config::load()?;
    config::apply_cli_overrides(
        &mut config,
        cli.region.as_deref(),
        cli.profile.as_deref(),
        cli.kms_key_id.as_deref(),
    );

    let ctx = AppContext {
        backends: Arc::new(AwsBackendProvider::new(config.aws.clone())),
        cache: cache_store,
        config,
    };

    match cli.command {
        Commands::Put(args) => commands::put::run(&ctx, args).await,
        Commands::Get(args) => commands::get::run(&ctx, args).await,
        Commands::Ls(args) => commands::ls::run(&ctx, args).await,
        Commands::Describe(args) => commands::describe::run(&ctx, args).await,
        Commands::Export(args) => commands::export::run(&ctx, args).await,
        Commands::Run(args) => commands::run::run(&ctx, args).await,
        Commands::Jsonize(args) => commands::jsonize::run(&ctx, args).await,
        Commands::Cache { command } => commands::cache::run(&ctx, command).await,
        Commands::Completion(args) => commands::completion::run(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_target(false),
        )
        .init();
}

/// The file store needs a resolvable home; without one, completion degrades
/// to the no-op store and the rest of the CLI keeps working.
fn build_cache_store() -> Arc<dyn CacheStore> {
    match FileStore::new() {
        Ok(store) => Arc::new(store),
        Err(err) => {
            warn!(error = %err, "cache init failed; completion disabled");
            Arc::new(NoopStore)
        }
    }
}

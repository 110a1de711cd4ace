//! The `jsonize` command: rebuild a nested JSON document from parameter paths.

use anyhow::{Context as _, Result, bail};
use clap::{Args, ValueEnum};

use crate::backend::{Backend as _, BackendKind, GetOptions, ParameterEntry, PutOptions, Ref};
use crate::jsonize as builder;
use crate::tags::StoreMode;

use super::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    String,
    Secure,
}

#[derive(Args, Debug)]
pub struct JsonizeArgs {
    /// Source prefix or leaf parameter (repeatable)
    #[arg(long = "frompath", required = true)]
    pub frompath: Vec<String>,

    /// Target ref to save JSON (omit to print to stdout)
    #[arg(long)]
    pub to: Option<String>,

    /// Storage mode for target [default: json]
    #[arg(long, value_enum)]
    pub store: Option<StoreMode>,

    /// Value type [default: string]
    #[arg(long = "value-type", value_enum)]
    pub value_type: Option<ValueType>,

    /// Overwrite target if it already exists (save mode only)
    #[arg(long)]
    pub force: bool,

    /// Print compact JSON without indentation (stdout mode only)
    #[arg(long)]
    pub compact: bool,
}

pub async fn run(ctx: &AppContext, args: JsonizeArgs) -> Result<()> {
    let froms: Vec<(Ref, String)> = args
        .frompath
        .iter()
        .map(|raw| {
            let parsed =
                Ref::parse(raw).context("jsonize command failed: invalid frompath ref")?;
            if parsed.kind == BackendKind::Sm {
                bail!(
                    "jsonize command failed: --frompath sm: backend is not supported (use ps: or psa:)"
                );
            }
            Ok((parsed, raw.clone()))
        })
        .collect::<Result<_>>()?;

    let stdout_mode = args.to.is_none();
    validate_flags(&args, stdout_mode)?;

    let target = match &args.to {
        Some(raw) => {
            let parsed = Ref::parse(raw).context("jsonize command failed: invalid target ref")?;
            for (from, raw_from) in &froms {
                if target_overlaps_source(&parsed.path, &from.path) {
                    bail!(
                        "jsonize command failed: target {raw:?} overlaps with --frompath {raw_from:?}"
                    );
                }
            }
            Some(parsed)
        }
        None => None,
    };

    let mut entries = Vec::new();
    for (from, raw_from) in &froms {
        let backend = ctx
            .backends
            .backend(from.kind)
            .await
            .context("jsonize command failed: create from backend")?;

        let listed = backend
            .list_by_prefix(&from.path, true)
            .await
            .context("jsonize command failed: get parameters")?;

        if listed.is_empty() && !from.path.ends_with('/') {
            // Leaf fallback; the fetched value is already decoded, so it goes
            // in as a raw entry.
            let value = backend
                .get(from, GetOptions::default())
                .await
                .with_context(|| {
                    format!("jsonize command failed: get leaf parameter {raw_from:?}")
                })?;
            let key_name = from.path.rsplit('/').next().unwrap_or(&from.path);
            entries.push(builder::Entry {
                path: key_name.to_string(),
                value,
                store_mode: StoreMode::Raw,
            });
        } else {
            entries.extend(to_builder_entries(&listed, &from.path));
        }
    }

    if let Some(target) = &target {
        if !args.force {
            ensure_target_absent(ctx, target).await?;
        }
    }

    let doc = builder::build(&entries, true).context("jsonize command failed: build json")?;

    match target {
        None => {
            let rendered = if args.compact {
                doc.to_string()
            } else {
                serde_json::to_string_pretty(&doc)
                    .context("jsonize command failed: indent json")?
            };
            println!("{rendered}");
        }
        Some(target) => {
            let backend = ctx
                .backends
                .backend(target.kind)
                .await
                .context("jsonize command failed: create target backend")?;
            backend
                .put(
                    &target,
                    PutOptions {
                        value: doc.to_string(),
                        store_mode: args.store.unwrap_or(StoreMode::Json),
                        secure: args.value_type == Some(ValueType::Secure),
                        kms_key_id: ctx.config.aws.kms_key_id.clone(),
                    },
                )
                .await
                .context("jsonize command failed: put target")?;
        }
    }

    Ok(())
}

fn validate_flags(args: &JsonizeArgs, stdout_mode: bool) -> Result<()> {
    if stdout_mode {
        if args.store.is_some() {
            bail!("jsonize command failed: --store is only valid with --to");
        }
        if args.value_type.is_some() {
            bail!("jsonize command failed: --value-type is only valid with --to");
        }
        if args.force {
            bail!("jsonize command failed: --force is only valid with --to");
        }
    } else if args.compact {
        bail!("jsonize command failed: --compact is only valid without --to");
    }
    Ok(())
}

/// The target may not live underneath any source prefix, which would make
/// the output feed back into its own input on the next run.
fn target_overlaps_source(target_path: &str, from_path: &str) -> bool {
    let from_base = format!("{}/", from_path.trim_end_matches('/'));
    format!("{target_path}/").starts_with(&from_base)
        || target_path == from_path.trim_end_matches('/')
}

async fn ensure_target_absent(ctx: &AppContext, target: &Ref) -> Result<()> {
    let backend = ctx
        .backends
        .backend(target.kind)
        .await
        .context("jsonize command failed: create target backend")?;

    match backend
        .get(target, GetOptions {
            force_raw: true,
            force_json: false,
        })
        .await
    {
        Ok(_) => bail!(
            "jsonize command failed: target already exists: {target} (use --force to overwrite)"
        ),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => {
            Err(anyhow::Error::new(err).context("jsonize command failed: check target existence"))
        }
    }
}

/// Converts listed parameters to builder entries with prefix-relative paths.
/// A parameter equal to the prefix itself is skipped.
fn to_builder_entries(listed: &[ParameterEntry], from_path: &str) -> Vec<builder::Entry> {
    let base = format!("{}/", from_path.trim_end_matches('/'));
    listed
        .iter()
        .filter_map(|entry| {
            let relative = entry.path.strip_prefix(&base)?;
            if relative.is_empty() {
                return None;
            }
            Some(builder::Entry {
                path: relative.to_string(),
                value: entry.value.clone(),
                store_mode: entry.store_mode,
            })
        })
        .collect()
}

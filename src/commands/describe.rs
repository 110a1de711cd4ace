//! The `describe` command: show metadata for a key.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::json;

use crate::backend::{Backend as _, BackendKind, DescribeOutput, Ref};

use super::AppContext;

#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Target ref (e.g. ps:/app/prod/DB_HOST, sm:secret-id)
    pub target: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &AppContext, args: DescribeArgs) -> Result<()> {
    let parsed = Ref::parse(&args.target).context("describe command failed: invalid ref")?;

    let backend = ctx
        .backends
        .backend(parsed.kind)
        .await
        .context("describe command failed: create backend")?;

    let out = backend
        .describe(&parsed)
        .await
        .context("describe command failed")?;

    if args.json {
        println!("{}", render_json(&args.target, &parsed, &out)?);
    } else {
        print!("{}", render_text(&args.target, &parsed, &out));
    }
    Ok(())
}

fn backend_label(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Ps => "Parameter Store (Standard)",
        BackendKind::Psa => "Parameter Store (Advanced)",
        BackendKind::Sm => "Secrets Manager",
    }
}

fn format_utc(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn render_json(raw_ref: &str, parsed: &Ref, out: &DescribeOutput) -> Result<String> {
    let mut obj = serde_json::Map::new();
    obj.insert("ref".to_string(), json!(raw_ref));
    obj.insert("path".to_string(), json!(out.path));
    obj.insert("backend".to_string(), json!(backend_label(parsed.kind)));
    obj.insert("tags".to_string(), json!(out.tags));

    if let Some(arn) = &out.arn {
        obj.insert("arn".to_string(), json!(arn));
    }
    if let Some(version) = out.version {
        obj.insert("version".to_string(), json!(version));
    }
    if let Some(ts) = &out.last_modified {
        obj.insert("lastModifiedDate".to_string(), json!(format_utc(ts)));
    }

    match parsed.kind {
        BackendKind::Ps | BackendKind::Psa => {
            if let Some(parameter_type) = &out.parameter_type {
                obj.insert("parameterType".to_string(), json!(parameter_type));
            }
            if let Some(tier) = &out.tier {
                obj.insert("tier".to_string(), json!(tier));
            }
            if let Some(data_type) = &out.data_type {
                obj.insert("dataType".to_string(), json!(data_type));
            }
        }
        BackendKind::Sm => {
            if let Some(ts) = &out.created_date {
                obj.insert("createdDate".to_string(), json!(format_utc(ts)));
            }
        }
    }

    serde_json::to_string_pretty(&serde_json::Value::Object(obj))
        .context("describe command failed: json encode")
}

fn render_text(raw_ref: &str, parsed: &Ref, out: &DescribeOutput) -> String {
    let mut text = String::new();
    let mut line = |label: &str, value: &str| {
        text.push_str(&format!("{:<16} {}\n", format!("{label}:"), value));
    };

    line("Ref", raw_ref);
    line("Path", &out.path);
    line("Backend", backend_label(parsed.kind));

    if let Some(arn) = &out.arn {
        line("ARN", arn);
    }

    match parsed.kind {
        BackendKind::Ps | BackendKind::Psa => {
            if let Some(parameter_type) = &out.parameter_type {
                line("Type", parameter_type);
            }
            if let Some(tier) = &out.tier {
                line("Tier", tier);
            }
            if let Some(data_type) = &out.data_type {
                line("DataType", data_type);
            }
        }
        BackendKind::Sm => {
            if let Some(ts) = &out.created_date {
                line("CreatedDate", &format_utc(ts));
            }
        }
    }

    if let Some(version) = out.version {
        line("Version", &version.to_string());
    }
    if let Some(ts) = &out.last_modified {
        line("LastModified", &format_utc(ts));
    }

    if !out.tags.is_empty() {
        text.push_str("Tags:\n");
        for (key, value) in &out.tags {
            text.push_str(&format!("  {key:<20} {value}\n"));
        }
    }

    text
}

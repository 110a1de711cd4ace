//! Rebuilding nested JSON from parameter paths.
//!
//! The inverse of flattening: each entry's sub-path is split on `/` and then
//! `_`, lowercased, and written into a nested object. Conflicting writes
//! (two leaves at one key, or a leaf where an object already sits) are
//! errors, never silent overwrites.

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use crate::tags::StoreMode;

/// One source entry: a sub-path relative to the listed prefix and its value.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub value: String,
    pub store_mode: StoreMode,
}

/// Builds the nested JSON document.
///
/// `json`-mode values are decoded before insertion. With `auto_convert`,
/// raw strings that look like booleans, numbers, or `null` become typed
/// values; everything else stays a string.
pub fn build(entries: &[Entry], auto_convert: bool) -> Result<Value> {
    let mut root = Map::new();

    for entry in entries {
        let parts = path_to_parts(&entry.path);

        let value = match entry.store_mode {
            StoreMode::Json => match serde_json::from_str(&entry.value) {
                Ok(value) => value,
                Err(err) => bail!("invalid json value for path {:?}: {err}", entry.path),
            },
            StoreMode::Raw if auto_convert => auto_convert_value(&entry.value),
            StoreMode::Raw => Value::String(entry.value.clone()),
        };

        set_nested(&mut root, &parts, value, &[])?;
    }

    Ok(Value::Object(root))
}

/// Splits on `/` then `_`, lowercasing: `nested/DB_HOST` becomes
/// `["nested", "db", "host"]`.
fn path_to_parts(path: &str) -> Vec<String> {
    path.split('/')
        .flat_map(|segment| segment.split('_'))
        .map(str::to_lowercase)
        .collect()
}

fn auto_convert_value(raw: &str) -> Value {
    match raw {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(f) = raw.parse::<f64>() {
        // NaN and infinities have no JSON representation.
        if f.is_finite() {
            if let Some(n) = number_from_f64(f) {
                return Value::Number(n);
            }
        }
    }
    Value::String(raw.to_string())
}

fn number_from_f64(f: f64) -> Option<serde_json::Number> {
    if f == f.trunc() && f.abs() < 9.007_199_254_740_992e15 {
        return Some(serde_json::Number::from(f as i64));
    }
    serde_json::Number::from_f64(f)
}

fn set_nested(root: &mut Map<String, Value>, parts: &[String], value: Value, trail: &[String]) -> Result<()> {
    let Some((key, rest)) = parts.split_first() else {
        return Ok(());
    };

    let mut full_path = trail.to_vec();
    full_path.push(key.clone());

    if rest.is_empty() {
        if root.contains_key(key) {
            bail!("conflict at key {:?}: key already set", full_path.join("."));
        }
        root.insert(key.clone(), value);
        return Ok(());
    }

    let child = root
        .entry(key.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    match child {
        Value::Object(map) => set_nested(map, rest, value, &full_path),
        _ => bail!(
            "conflict at key {:?}: cannot set child on a non-object",
            full_path.join(".")
        ),
    }
}

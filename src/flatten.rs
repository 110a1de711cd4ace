//! Flattening of JSON values into environment-variable pairs.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde_json::Value;

/// How JSON arrays are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArrayMode {
    /// Join plain string elements with a delimiter; mixed arrays fall back
    /// to index mode.
    Join,
    /// One variable per element, suffixed with its index.
    Index,
    /// The whole array as one JSON-encoded value.
    Json,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub delimiter: String,
    pub array_mode: ArrayMode,
    pub array_join_delim: String,
    pub upper: bool,
    pub no_flatten: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            delimiter: "_".to_string(),
            array_mode: ArrayMode::Join,
            array_join_delim: ",".to_string(),
            upper: true,
            no_flatten: false,
        }
    }
}

/// Flattens one raw value under `prefix`. Values that do not parse as JSON
/// are kept as-is under the prefix key.
pub fn flatten(prefix: &str, raw_value: &str, opts: &Options) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();

    if opts.no_flatten {
        set_key(&mut result, prefix, raw_value.to_string(), opts);
        return result;
    }

    match serde_json::from_str::<Value>(raw_value) {
        Ok(value) => flatten_any(prefix, &value, opts, &mut result),
        Err(_) => set_key(&mut result, prefix, raw_value.to_string(), opts),
    }
    result
}

/// Replaces hyphens with underscores and applies the configured casing.
pub fn apply_casing(key: &str, opts: &Options) -> String {
    let key = key.replace('-', "_");
    if opts.upper {
        key.to_uppercase()
    } else {
        key.to_lowercase()
    }
}

fn flatten_any(key: &str, value: &Value, opts: &Options, result: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (child, child_value) in map {
                let child_key = join_key(key, child, &opts.delimiter);
                flatten_any(&child_key, child_value, opts, result);
            }
        }
        Value::Array(items) => flatten_array(key, items, opts, result),
        Value::String(s) => {
            // A string holding an encoded object or array flattens further.
            if let Ok(nested) = serde_json::from_str::<Value>(s) {
                if !nested.is_string() {
                    flatten_any(key, &nested, opts, result);
                    return;
                }
            }
            set_key(result, key, s.clone(), opts);
        }
        Value::Number(n) => set_key(result, key, format_number(n), opts),
        Value::Bool(b) => set_key(result, key, b.to_string(), opts),
        Value::Null => set_key(result, key, String::new(), opts),
    }
}

fn flatten_array(key: &str, items: &[Value], opts: &Options, result: &mut BTreeMap<String, String>) {
    if items.is_empty() {
        return;
    }

    match opts.array_mode {
        ArrayMode::Json => {
            let raw = Value::Array(items.to_vec()).to_string();
            set_key(result, key, raw, opts);
        }
        ArrayMode::Join => match try_join_strings(items) {
            Some(parts) => {
                set_key(result, key, parts.join(&opts.array_join_delim), opts);
            }
            None => flatten_array_by_index(key, items, opts, result),
        },
        ArrayMode::Index => flatten_array_by_index(key, items, opts, result),
    }
}

fn flatten_array_by_index(
    key: &str,
    items: &[Value],
    opts: &Options,
    result: &mut BTreeMap<String, String>,
) {
    for (index, item) in items.iter().enumerate() {
        let child_key = join_key(key, &index.to_string(), &opts.delimiter);
        flatten_any(&child_key, item, opts, result);
    }
}

/// Returns the elements when every one is a plain string that is not itself
/// parseable JSON (such strings need further flattening, not joining).
fn try_join_strings(items: &[Value]) -> Option<Vec<String>> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(s) = item else {
            return None;
        };
        if serde_json::from_str::<Value>(s).is_ok() {
            return None;
        }
        parts.push(s.clone());
    }
    Some(parts)
}

fn join_key(prefix: &str, suffix: &str, delimiter: &str) -> String {
    if prefix.is_empty() {
        suffix.to_string()
    } else {
        format!("{prefix}{delimiter}{suffix}")
    }
}

fn set_key(result: &mut BTreeMap<String, String>, key: &str, value: String, opts: &Options) {
    result.insert(apply_casing(key, opts), value);
}

/// Integer-valued numbers render without a decimal point.
fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f == f.trunc() && f.abs() < 9.007_199_254_740_992e15 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> Options {
        Options::default()
    }

    #[test]
    fn plain_string_stays_raw() {
        let out = flatten("db_host", "example.com", &opts());
        assert_eq!(out.get("DB_HOST").map(String::as_str), Some("example.com"));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn objects_flatten_recursively() {
        let out = flatten("app", r#"{"db":{"host":"h","port":5432}}"#, &opts());
        assert_eq!(out.get("APP_DB_HOST").map(String::as_str), Some("h"));
        assert_eq!(out.get("APP_DB_PORT").map(String::as_str), Some("5432"));
    }

    #[test]
    fn no_flatten_keeps_document_whole() {
        let mut o = opts();
        o.no_flatten = true;
        let raw = r#"{"a":1}"#;
        let out = flatten("cfg", raw, &o);
        assert_eq!(out.get("CFG").map(String::as_str), Some(raw));
    }

    #[test]
    fn string_arrays_join_by_default() {
        let out = flatten("hosts", r#"["a","b","c"]"#, &opts());
        assert_eq!(out.get("HOSTS").map(String::as_str), Some("a,b,c"));
    }

    #[test]
    fn mixed_arrays_fall_back_to_index_mode() {
        let out = flatten("vals", r#"["a",1]"#, &opts());
        assert_eq!(out.get("VALS_0").map(String::as_str), Some("a"));
        assert_eq!(out.get("VALS_1").map(String::as_str), Some("1"));
    }

    #[test]
    fn index_mode_expands_each_element() {
        let mut o = opts();
        o.array_mode = ArrayMode::Index;
        let out = flatten("hosts", r#"["a","b"]"#, &o);
        assert_eq!(out.get("HOSTS_0").map(String::as_str), Some("a"));
        assert_eq!(out.get("HOSTS_1").map(String::as_str), Some("b"));
    }

    #[test]
    fn json_mode_keeps_array_encoded() {
        let mut o = opts();
        o.array_mode = ArrayMode::Json;
        let out = flatten("hosts", r#"["a","b"]"#, &o);
        assert_eq!(out.get("HOSTS").map(String::as_str), Some(r#"["a","b"]"#));
    }

    #[test]
    fn empty_arrays_produce_nothing() {
        let out = flatten("xs", "[]", &opts());
        assert!(out.is_empty());
    }

    #[test]
    fn nested_json_strings_flatten_further() {
        let out = flatten("outer", r#"{"inner":"{\"k\":\"v\"}"}"#, &opts());
        assert_eq!(out.get("OUTER_INNER_K").map(String::as_str), Some("v"));
    }

    #[test]
    fn scalars_render_as_text() {
        let out = flatten("x", "true", &opts());
        assert_eq!(out.get("X").map(String::as_str), Some("true"));

        let out = flatten("x", "null", &opts());
        assert_eq!(out.get("X").map(String::as_str), Some(""));

        let out = flatten("x", "1.5", &opts());
        assert_eq!(out.get("X").map(String::as_str), Some("1.5"));

        let out = flatten("x", "3.0", &opts());
        assert_eq!(out.get("X").map(String::as_str), Some("3"));
    }

    #[test]
    fn casing_and_hyphens_normalize() {
        let o = opts();
        assert_eq!(apply_casing("db-host", &o), "DB_HOST");

        let mut lower = opts();
        lower.upper = false;
        assert_eq!(apply_casing("DB-Host", &lower), "db_host");
    }

    #[test]
    fn custom_delimiter_applies() {
        let mut o = opts();
        o.delimiter = "__".to_string();
        let out = flatten("app", r#"{"db":{"host":"h"}}"#, &o);
        assert_eq!(out.get("APP__DB__HOST").map(String::as_str), Some("h"));
    }
}

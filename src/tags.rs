//! Managed resource tags and the storage-mode marker.
//!
//! Every key written by this tool carries a small set of tags so that later
//! reads can tell how the value was stored without guessing.

use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const TAG_CLI: &str = "cli";
pub const TAG_STORE_MODE: &str = "cli-store-mode";
pub const TAG_SCHEMA: &str = "cli-schema";

pub const TAG_CLI_VALUE: &str = "bundr";
pub const TAG_SCHEMA_VALUE: &str = "v1";

/// How a value is stored in the remote backend: verbatim text or a
/// JSON-encoded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    Raw,
    Json,
}

impl StoreMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreMode::Raw => "raw",
            StoreMode::Json => "json",
        }
    }

    /// Parses the value of a `cli-store-mode` tag, defaulting to raw for
    /// anything unrecognized.
    pub fn from_tag(value: &str) -> Self {
        match value {
            "json" => StoreMode::Json,
            _ => StoreMode::Raw,
        }
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the tags stamped onto every managed key.
pub fn managed_tags(store_mode: StoreMode) -> BTreeMap<String, String> {
    BTreeMap::from([
        (TAG_CLI.to_string(), TAG_CLI_VALUE.to_string()),
        (TAG_STORE_MODE.to_string(), store_mode.to_string()),
        (TAG_SCHEMA.to_string(), TAG_SCHEMA_VALUE.to_string()),
    ])
}

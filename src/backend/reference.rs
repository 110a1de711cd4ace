//! Parsing of `<backend>:<path>` reference strings.

use std::fmt;

use thiserror::Error;

/// Which remote store a ref targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// SSM Parameter Store, standard tier.
    Ps,
    /// SSM Parameter Store, advanced tier.
    Psa,
    /// Secrets Manager.
    Sm,
}

impl BackendKind {
    /// The canonical short name used in refs and cache file names.
    pub fn short(self) -> &'static str {
        match self {
            BackendKind::Ps => "ps",
            BackendKind::Psa => "psa",
            BackendKind::Sm => "sm",
        }
    }

    /// Whether the backend supports listing keys under a path prefix.
    /// Secrets Manager names are flat, so bulk operations are unsupported.
    pub fn supports_prefix_listing(self) -> bool {
        !matches!(self, BackendKind::Sm)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// A parsed backend reference: `ps:/app/prod/DB_HOST`, `sm:prod/api-key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    pub kind: BackendKind,
    pub path: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefError {
    #[error("empty ref")]
    Empty,
    #[error("invalid ref {0:?}: missing prefix (expected ps:, psa:, or sm:)")]
    MissingPrefix(String),
    #[error("unknown backend prefix {prefix:?} in ref {raw:?}")]
    UnknownPrefix { prefix: String, raw: String },
    #[error("invalid ref {0:?}: path is empty")]
    EmptyPath(String),
}

impl Ref {
    /// Parses a ref string. Only the first `:` separates the backend prefix
    /// from the path, so secret names may themselves contain colons.
    pub fn parse(raw: &str) -> Result<Self, RefError> {
        if raw.is_empty() {
            return Err(RefError::Empty);
        }

        let Some((prefix, path)) = raw.split_once(':') else {
            return Err(RefError::MissingPrefix(raw.to_string()));
        };

        let kind = match prefix {
            "ps" => BackendKind::Ps,
            "psa" => BackendKind::Psa,
            "sm" => BackendKind::Sm,
            _ => {
                return Err(RefError::UnknownPrefix {
                    prefix: prefix.to_string(),
                    raw: raw.to_string(),
                });
            }
        };

        if path.is_empty() {
            return Err(RefError::EmptyPath(raw.to_string()));
        }

        Ok(Ref {
            kind,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.path)
    }
}

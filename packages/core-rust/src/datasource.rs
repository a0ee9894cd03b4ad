//! Datasource references and metadata.
//!
//! A request names its target through the `recipient` path segment. The
//! segment is either the reserved native recipient, a numeric datasource id,
//! or a datasource UID.
//!
//! All-digit segments parse as ids. A datasource whose UID is all digits is
//! still reachable: lookups fall back to the UID when no datasource has that
//! id. Leading zeros are not preserved by the fallback.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Recipient name that addresses the server's own rule store.
pub const NATIVE_RECIPIENT: &str = "grafana";

static UID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{1,40}$").expect("valid uid pattern")
});

/// Parsed target of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatasourceRef {
    /// The reserved native recipient.
    Native,
    /// Datasource addressed by numeric id.
    Id(i64),
    /// Datasource addressed by UID.
    Uid(String),
}

impl DatasourceRef {
    /// Parses a raw recipient string.
    ///
    /// All-digit strings are ids; anything else must be a valid UID.
    /// Returns `None` when the string is empty or malformed.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == NATIVE_RECIPIENT {
            return Some(Self::Native);
        }
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw.parse::<i64>().ok().map(Self::Id);
        }
        if UID_PATTERN.is_match(raw) {
            return Some(Self::Uid(raw.to_string()));
        }
        None
    }
}

impl fmt::Display for DatasourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str(NATIVE_RECIPIENT),
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Uid(uid) => write!(f, "uid:{uid}"),
        }
    }
}

/// Metadata a datasource lookup returns for a resolved reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceMeta {
    pub id: i64,
    pub uid: String,
    pub name: String,
    /// Datasource type, e.g. `"prometheus"` or `"loki"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Base URL of the datasource's HTTP API.
    #[serde(default)]
    pub url: String,
}

//! Backend kinds and the fixed datasource-type mapping used for classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Implementation family that owns a request.
///
/// Adding a kind means adding a variant here, a row in
/// [`BackendKind::for_datasource_type`], and a registry entry in the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Rules and alert state managed by this server.
    Native,
    /// Rules owned by a Prometheus-compatible ruler (Prometheus, Loki) reached over HTTP.
    Proxied,
}

/// Datasource types whose ruler API is Prometheus-compatible.
pub const PROXIED_DATASOURCE_TYPES: &[&str] = &["prometheus", "loki"];

/// Datasource type reported for the server's own rule store.
pub const NATIVE_DATASOURCE_TYPE: &str = "grafana";

impl BackendKind {
    /// All kinds, in declaration order.
    pub const ALL: [BackendKind; 2] = [BackendKind::Native, BackendKind::Proxied];

    /// Maps a datasource type string to the backend kind that serves it.
    ///
    /// Returns `None` for types without a mapping; callers surface that as an
    /// unsupported backend rather than guessing.
    #[must_use]
    pub fn for_datasource_type(datasource_type: &str) -> Option<Self> {
        if datasource_type == NATIVE_DATASOURCE_TYPE {
            Some(Self::Native)
        } else if PROXIED_DATASOURCE_TYPES.contains(&datasource_type) {
            Some(Self::Proxied)
        } else {
            None
        }
    }

    /// Stable lowercase name used in logs, metrics labels and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Proxied => "proxied",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

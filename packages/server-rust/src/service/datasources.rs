//! In-memory datasource cache: the bundled `DatasourceLookup` implementation.

use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use dashmap::DashMap;
use ruler_core::backend::NATIVE_DATASOURCE_TYPE;
use ruler_core::{DatasourceMeta, DatasourceRef, NATIVE_RECIPIENT};

use crate::traits::{DatasourceLookup, LookupError};

/// Datasource metadata indexed by UID and by numeric id.
///
/// Concurrent reads and inserts are safe; entries are replaced wholesale on
/// re-insert.
#[derive(Debug, Default)]
pub struct DatasourceCache {
    by_uid: DashMap<String, DatasourceMeta>,
    uid_by_id: DashMap<i64, String>,
}

impl DatasourceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cache holding `datasources`.
    #[must_use]
    pub fn from_datasources(datasources: impl IntoIterator<Item = DatasourceMeta>) -> Self {
        let cache = Self::new();
        for ds in datasources {
            cache.insert(ds);
        }
        cache
    }

    /// Loads a JSON array of datasources (`[{"id", "uid", "name", "type", "url"}]`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid datasource list.
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading datasources from {}", path.display()))?;
        let datasources: Vec<DatasourceMeta> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing datasources from {}", path.display()))?;
        tracing::info!(count = datasources.len(), path = %path.display(), "loaded datasources");
        Ok(Self::from_datasources(datasources))
    }

    /// Inserts or replaces a datasource.
    pub fn insert(&self, ds: DatasourceMeta) {
        if let Some(previous) = self.by_uid.get(&ds.uid).map(|e| e.id) {
            if previous != ds.id {
                self.uid_by_id.remove(&previous);
            }
        }
        self.uid_by_id.insert(ds.id, ds.uid.clone());
        self.by_uid.insert(ds.uid.clone(), ds);
    }

    /// Removes a datasource by UID, returning it if present.
    pub fn remove(&self, uid: &str) -> Option<DatasourceMeta> {
        let (_, ds) = self.by_uid.remove(uid)?;
        self.uid_by_id.remove_if(&ds.id, |_, mapped| mapped == uid);
        Some(ds)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }

    fn native() -> DatasourceMeta {
        DatasourceMeta {
            id: 0,
            uid: NATIVE_RECIPIENT.to_string(),
            name: "Grafana".to_string(),
            kind: NATIVE_DATASOURCE_TYPE.to_string(),
            url: String::new(),
        }
    }
}

#[async_trait]
impl DatasourceLookup for DatasourceCache {
    async fn resolve(&self, reference: &DatasourceRef) -> Result<DatasourceMeta, LookupError> {
        let found = match reference {
            DatasourceRef::Native => Some(Self::native()),
            DatasourceRef::Uid(uid) => self.by_uid.get(uid).map(|e| e.value().clone()),
            DatasourceRef::Id(id) => {
                // Clone the uid out before touching the other map. Numeric
                // UIDs are only reachable through the fallback.
                let uid = self
                    .uid_by_id
                    .get(id)
                    .map_or_else(|| id.to_string(), |e| e.value().clone());
                self.by_uid.get(&uid).map(|e| e.value().clone())
            }
        };
        found.ok_or_else(|| LookupError::NotFound {
            reference: reference.to_string(),
        })
    }
}

//! Backend classification: derives the owning `BackendKind` from a request.

use std::sync::Arc;

use ruler_core::{BackendKind, DatasourceRef, RequestContext};

use super::operation::DispatchError;
use crate::traits::DatasourceLookup;

// ---------------------------------------------------------------------------
// BackendClassifier
// ---------------------------------------------------------------------------

/// Decides which backend kind owns a request.
///
/// The native recipient is classified without a lookup. Any other reference
/// is resolved through the datasource lookup and its type mapped by
/// [`BackendKind::for_datasource_type`].
#[derive(Clone)]
pub struct BackendClassifier {
    lookup: Arc<dyn DatasourceLookup>,
}

impl BackendClassifier {
    #[must_use]
    pub fn new(lookup: Arc<dyn DatasourceLookup>) -> Self {
        Self { lookup }
    }

    /// Classify a request.
    ///
    /// # Errors
    ///
    /// - `DispatchError::InvalidRequest` if the recipient is missing or malformed
    /// - `DispatchError::ClassificationFailed` if the lookup fails
    /// - `DispatchError::UnsupportedBackend` if the datasource type has no mapping
    pub async fn classify(&self, ctx: &RequestContext) -> Result<BackendKind, DispatchError> {
        let reference = match (ctx.recipient.as_deref(), ctx.datasource_ref()) {
            (_, Some(reference)) => reference,
            (None, None) => {
                return Err(DispatchError::InvalidRequest {
                    reason: "recipient is required".to_string(),
                })
            }
            (Some(raw), None) => {
                return Err(DispatchError::InvalidRequest {
                    reason: format!("recipient {raw:?} is not a valid data source reference"),
                })
            }
        };

        if reference == DatasourceRef::Native {
            return Ok(BackendKind::Native);
        }

        let meta = self.lookup.resolve(&reference).await.map_err(|source| {
            DispatchError::ClassificationFailed {
                reference: reference.to_string(),
                source,
            }
        })?;

        BackendKind::for_datasource_type(&meta.kind).ok_or(DispatchError::UnsupportedBackend {
            datasource_type: meta.kind,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

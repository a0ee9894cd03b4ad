use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ruler_core::BackendKind;

use crate::traits::RulerBackend;

// ---------------------------------------------------------------------------
// BackendRegistry
// ---------------------------------------------------------------------------

/// Immutable mapping from backend kind to the implementation serving it.
///
/// Built once at wiring time through [`BackendRegistryBuilder`] and shared
/// read-only afterwards; lookups take no locks.
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn RulerBackend>>,
}

impl BackendRegistry {
    #[must_use]
    pub fn builder() -> BackendRegistryBuilder {
        BackendRegistryBuilder::default()
    }

    /// Returns the implementation registered for `kind`.
    #[must_use]
    pub fn get(&self, kind: BackendKind) -> Option<&Arc<dyn RulerBackend>> {
        self.backends.get(&kind)
    }

    /// Registered kinds in declaration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<_> = self.backends.keys().copied().collect();
        kinds.sort();
        kinds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BackendRegistryBuilder
// ---------------------------------------------------------------------------

/// Collects backend implementations before freezing them into a registry.
#[derive(Default)]
pub struct BackendRegistryBuilder {
    backends: HashMap<BackendKind, Arc<dyn RulerBackend>>,
}

impl BackendRegistryBuilder {
    /// Register `backend` for `kind`. A later registration for the same kind
    /// replaces the earlier one.
    #[must_use]
    pub fn with(mut self, kind: BackendKind, backend: Arc<dyn RulerBackend>) -> Self {
        if self.backends.insert(kind, backend).is_some() {
            tracing::warn!(backend = %kind, "backend registered twice, keeping the last one");
        }
        self
    }

    #[must_use]
    pub fn build(self) -> BackendRegistry {
        BackendRegistry {
            backends: self.backends,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

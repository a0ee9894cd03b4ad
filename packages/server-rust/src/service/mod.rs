//! Ruler API dispatch.
//!
//! Requests flow through:
//!
//! 1. **Classification** (`classify`): `RequestContext` -> `Result<BackendKind, DispatchError>`
//! 2. **Routing** (`router`): pick the backend registered for the kind and delegate
//! 3. **Backends** (`backends`): native rule state and the Prometheus-compatible proxy
//! 4. **Middleware** (`middleware`): auth and metrics wrappers applied to every route

pub mod backends;
pub mod classify;
pub mod config;
pub mod datasources;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod response;
pub mod router;

// Re-export key types for convenient access.
pub use classify::BackendClassifier;
pub use config::{LogFormat, ServerConfig};
pub use datasources::DatasourceCache;
pub use operation::{DispatchError, RulerOperation};
pub use registry::{BackendRegistry, BackendRegistryBuilder};
pub use response::{ApiResponse, ErrorBody};
pub use router::ForkedRulerApi;

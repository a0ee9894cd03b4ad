//! Bundled `RulerBackend` implementations, one per `BackendKind`.
//!
//! - [`native`]: rules managed by this server
//! - [`proxy`]: Prometheus-compatible rulers reached over HTTP

pub mod native;
pub mod proxy;

pub use native::{AlertStatus, NativeBackend, RuleGroupStatus, RuleSnapshot, RuleStatus};
pub use proxy::{ProxyBackend, ProxyError};

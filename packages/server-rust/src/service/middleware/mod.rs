//! Tower middleware applied uniformly to every ruler route.
//!
//! - [`auth`]: Bearer-token signed-in requirement
//! - [`metrics`]: Request counting and timing via the `metrics` facade and `tracing` spans

pub mod auth;
pub mod metrics;

pub use auth::{Caller, RequireSignedInLayer, TokenVerifier};
pub use metrics::RouteMetricsLayer;

//! HTTP handler definitions for the ruler server.
//!
//! Defines `AppState` (the shared state carried through axum extractors) and
//! re-exports all handler functions for building the router.

pub mod binding;
pub mod health;
pub mod ruler;

pub use binding::{Bound, RulerContext};
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use ruler::{
    route_eval_queries, route_eval_queries_native, route_get_alert_statuses,
    route_get_rule_statuses, route_test_rule_config,
};

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::service::ForkedRulerApi;

/// Shared application state passed to all handlers via `State` extraction.
/// Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Fork dispatcher serving the ruler routes.
    pub api: Arc<ForkedRulerApi>,
    /// Health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

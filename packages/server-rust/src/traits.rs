use async_trait::async_trait;
use ruler_core::{
    DatasourceMeta, DatasourceRef, EvalQueriesPayload, RequestContext, TestRulePayload,
};

use crate::service::response::ApiResponse;

/// Errors returned by a [`DatasourceLookup`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("data source not found: {reference}")]
    NotFound { reference: String },
    #[error("data source lookup unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a datasource reference to its metadata.
/// Implementations: in-memory cache (`DatasourceCache`), mocks (tests).
///
/// Calls may block on I/O and may fail; callers propagate failures instead of
/// retrying.
#[async_trait]
pub trait DatasourceLookup: Send + Sync {
    /// Resolve a reference to the datasource it names.
    async fn resolve(&self, reference: &DatasourceRef) -> Result<DatasourceMeta, LookupError>;
}

/// Operation set every ruler backend exposes.
///
/// Signatures are identical across backends; only behavior differs. Each
/// method returns a complete response, errors included, which the dispatcher
/// passes to the caller untouched.
#[async_trait]
pub trait RulerBackend: Send + Sync {
    /// Currently active alerts, in the Prometheus `/api/v1/alerts` shape.
    async fn get_alert_statuses(&self, ctx: &RequestContext) -> ApiResponse;

    /// Rule groups and their evaluation state, in the Prometheus `/api/v1/rules` shape.
    async fn get_rule_statuses(&self, ctx: &RequestContext) -> ApiResponse;

    /// Evaluate a set of queries once.
    async fn evaluate_queries(
        &self,
        ctx: &RequestContext,
        payload: EvalQueriesPayload,
    ) -> ApiResponse;

    /// Test a rule definition without saving it.
    async fn test_rule(&self, ctx: &RequestContext, payload: TestRulePayload) -> ApiResponse;
}

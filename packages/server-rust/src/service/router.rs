//! Fork dispatcher: classifies each request and forwards it to exactly one backend.

use std::sync::Arc;

use ruler_core::{EvalQueriesPayload, RequestContext, TestRulePayload};
use tracing::{debug, warn};

use super::classify::BackendClassifier;
use super::operation::{DispatchError, RulerOperation};
use super::registry::BackendRegistry;
use super::response::ApiResponse;
use crate::traits::{DatasourceLookup, RulerBackend};

// ---------------------------------------------------------------------------
// ForkedRulerApi
// ---------------------------------------------------------------------------

/// Serves the ruler API by delegating every call to the backend that owns it.
///
/// Per call: classify the request, pick the backend registered for the
/// resulting kind, invoke its same-named operation, and return that response
/// unchanged. Classification and selection failures become 400 responses and
/// never reach a backend. There is no fallback between backends.
#[derive(Clone)]
pub struct ForkedRulerApi {
    classifier: BackendClassifier,
    registry: Arc<BackendRegistry>,
}

impl ForkedRulerApi {
    #[must_use]
    pub fn new(lookup: Arc<dyn DatasourceLookup>, registry: Arc<BackendRegistry>) -> Self {
        Self {
            classifier: BackendClassifier::new(lookup),
            registry,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Classify `ctx` and return the backend that must serve it.
    async fn select(
        &self,
        op: RulerOperation,
        ctx: &RequestContext,
    ) -> Result<&Arc<dyn RulerBackend>, DispatchError> {
        let result = match self.classifier.classify(ctx).await {
            Ok(kind) => self
                .registry
                .get(kind)
                .map(|backend| (kind, backend))
                .ok_or(DispatchError::UnexpectedBackend { kind }),
            Err(err) => Err(err),
        };

        match result {
            Ok((kind, backend)) => {
                debug!(
                    operation = op.as_str(),
                    backend = %kind,
                    request_id = %ctx.request_id,
                    "dispatching"
                );
                Ok(backend)
            }
            Err(err) => {
                warn!(
                    operation = op.as_str(),
                    error = err.kind(),
                    request_id = %ctx.request_id,
                    "dispatch rejected: {err}"
                );
                Err(err)
            }
        }
    }

    pub async fn get_alert_statuses(&self, ctx: &RequestContext) -> ApiResponse {
        match self.select(RulerOperation::GetAlertStatuses, ctx).await {
            Ok(backend) => backend.get_alert_statuses(ctx).await,
            Err(err) => err.into(),
        }
    }

    pub async fn get_rule_statuses(&self, ctx: &RequestContext) -> ApiResponse {
        match self.select(RulerOperation::GetRuleStatuses, ctx).await {
            Ok(backend) => backend.get_rule_statuses(ctx).await,
            Err(err) => err.into(),
        }
    }

    pub async fn evaluate_queries(
        &self,
        ctx: &RequestContext,
        payload: EvalQueriesPayload,
    ) -> ApiResponse {
        match self.select(RulerOperation::EvaluateQueries, ctx).await {
            Ok(backend) => backend.evaluate_queries(ctx, payload).await,
            Err(err) => err.into(),
        }
    }

    pub async fn test_rule(&self, ctx: &RequestContext, payload: TestRulePayload) -> ApiResponse {
        match self.select(RulerOperation::TestRule, ctx).await {
            Ok(backend) => backend.test_rule(ctx, payload).await,
            Err(err) => err.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

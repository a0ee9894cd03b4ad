//! Ruler API handlers. Each one binds the request, then hands it to the fork
//! dispatcher and returns the dispatcher's response as-is.

use axum::extract::State;
use ruler_core::{EvalQueriesPayload, TestRulePayload, NATIVE_RECIPIENT};

use super::binding::{Bound, RulerContext};
use super::AppState;
use crate::service::response::ApiResponse;

/// `GET /api/prometheus/{recipient}/api/v1/alerts`
pub async fn route_get_alert_statuses(
    State(state): State<AppState>,
    RulerContext(ctx): RulerContext,
) -> ApiResponse {
    let _in_flight = state.shutdown.in_flight_guard();
    state.api.get_alert_statuses(&ctx).await
}

/// `GET /api/prometheus/{recipient}/api/v1/rules`
pub async fn route_get_rule_statuses(
    State(state): State<AppState>,
    RulerContext(ctx): RulerContext,
) -> ApiResponse {
    let _in_flight = state.shutdown.in_flight_guard();
    state.api.get_rule_statuses(&ctx).await
}

/// `POST /api/v1/eval`
///
/// Evaluation without a recipient targets the server's own rule store.
pub async fn route_eval_queries_native(
    State(state): State<AppState>,
    RulerContext(mut ctx): RulerContext,
    Bound(payload): Bound<EvalQueriesPayload>,
) -> ApiResponse {
    let _in_flight = state.shutdown.in_flight_guard();
    ctx.recipient = Some(NATIVE_RECIPIENT.to_string());
    state.api.evaluate_queries(&ctx, payload).await
}

/// `POST /api/v1/eval/{recipient}`
pub async fn route_eval_queries(
    State(state): State<AppState>,
    RulerContext(ctx): RulerContext,
    Bound(payload): Bound<EvalQueriesPayload>,
) -> ApiResponse {
    let _in_flight = state.shutdown.in_flight_guard();
    state.api.evaluate_queries(&ctx, payload).await
}

/// `POST /api/v1/rule/test/{recipient}`
pub async fn route_test_rule_config(
    State(state): State<AppState>,
    RulerContext(ctx): RulerContext,
    Bound(payload): Bound<TestRulePayload>,
) -> ApiResponse {
    let _in_flight = state.shutdown.in_flight_guard();
    state.api.test_rule(&ctx, payload).await
}

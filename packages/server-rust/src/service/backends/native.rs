//! Backend for rules managed by this server.
//!
//! Serves alert and rule state from an in-memory snapshot. The snapshot is
//! seeded from a rules file at startup ([`NativeBackend::load_file`]) and
//! replaced per organisation through [`NativeBackend::publish`]. Query evaluation is
//! not part of this server; evaluation requests are validated and then
//! answered with 501.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use axum::http::StatusCode;
use parking_lot::RwLock;
use ruler_core::{AlertCondition, EvalQueriesPayload, RequestContext, TestRulePayload};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::service::response::ApiResponse;
use crate::traits::RulerBackend;

// ---------------------------------------------------------------------------
// Rule state snapshot (Prometheus-compatible shapes)
// ---------------------------------------------------------------------------

/// One active alert instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatus {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// `"firing"`, `"pending"` or `"inactive"`.
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_at: Option<String>,
    pub value: String,
}

/// Evaluation state of one alerting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleStatus {
    pub name: String,
    pub query: String,
    pub state: String,
    pub health: String,
    #[serde(default, rename = "lastError", skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub alerts: Vec<AlertStatus>,
    #[serde(rename = "type")]
    pub rule_type: String,
}

/// A named group of rules evaluated together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroupStatus {
    pub name: String,
    pub file: String,
    pub rules: Vec<RuleStatus>,
    /// Evaluation interval in seconds.
    pub interval: f64,
}

/// Rule groups per organisation.
pub type RuleSnapshot = BTreeMap<i64, Vec<RuleGroupStatus>>;

// ---------------------------------------------------------------------------
// NativeBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct NativeBackend {
    snapshot: RwLock<RuleSnapshot>,
}

impl NativeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_snapshot(snapshot: RuleSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Loads a snapshot from a JSON object keyed by org id:
    /// `{"1": [{"name", "file", "rules", "interval"}]}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading rule snapshot from {}", path.display()))?;
        let snapshot: RuleSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing rule snapshot from {}", path.display()))?;
        tracing::info!(orgs = snapshot.len(), path = %path.display(), "loaded rule snapshot");
        Ok(Self::with_snapshot(snapshot))
    }

    /// Replace the rule groups of one organisation.
    pub fn publish(&self, org_id: i64, groups: Vec<RuleGroupStatus>) {
        self.snapshot.write().insert(org_id, groups);
    }

    fn groups(&self, org_id: i64) -> Vec<RuleGroupStatus> {
        self.snapshot.read().get(&org_id).cloned().unwrap_or_default()
    }
}

/// Ensures the condition names one of its own queries.
fn validate_condition(cond: &AlertCondition) -> Result<(), String> {
    if cond.data.is_empty() {
        return Err("condition has no queries".to_string());
    }
    if cond.condition.is_empty() {
        return Err("condition ref_id is empty".to_string());
    }
    if !cond.data.iter().any(|q| q.ref_id == cond.condition) {
        return Err(format!(
            "condition {:?} does not match any query ref_id",
            cond.condition
        ));
    }
    Ok(())
}

fn not_evaluable() -> ApiResponse {
    ApiResponse::error(
        StatusCode::NOT_IMPLEMENTED,
        "query evaluation is not available on this server",
        None,
    )
}

#[async_trait]
impl RulerBackend for NativeBackend {
    async fn get_alert_statuses(&self, ctx: &RequestContext) -> ApiResponse {
        let alerts: Vec<AlertStatus> = self
            .groups(ctx.org_id)
            .into_iter()
            .flat_map(|g| g.rules)
            .flat_map(|r| r.alerts)
            .collect();
        ApiResponse::json(
            StatusCode::OK,
            &json!({ "status": "success", "data": { "alerts": alerts } }),
        )
    }

    async fn get_rule_statuses(&self, ctx: &RequestContext) -> ApiResponse {
        let mut groups = self.groups(ctx.org_id);
        if let Some(state) = ctx.query_param("state") {
            for group in &mut groups {
                group.rules.retain(|r| r.state == state);
            }
            groups.retain(|g| !g.rules.is_empty());
        }
        ApiResponse::json(
            StatusCode::OK,
            &json!({ "status": "success", "data": { "groups": groups } }),
        )
    }

    async fn evaluate_queries(
        &self,
        _ctx: &RequestContext,
        payload: EvalQueriesPayload,
    ) -> ApiResponse {
        if payload.data.is_empty() {
            return ApiResponse::error(StatusCode::BAD_REQUEST, "no queries to evaluate", None);
        }
        not_evaluable()
    }

    async fn test_rule(&self, _ctx: &RequestContext, payload: TestRulePayload) -> ApiResponse {
        let Some(cond) = payload.grafana_condition else {
            return ApiResponse::error(
                StatusCode::BAD_REQUEST,
                "invalid rule: grafana_condition is required for grafana managed rules",
                None,
            );
        };
        if let Err(reason) = validate_condition(&cond) {
            return ApiResponse::error(StatusCode::BAD_REQUEST, "invalid rule", Some(reason));
        }
        not_evaluable()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

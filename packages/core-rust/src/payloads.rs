//! Request payloads for the payload-bearing operations.
//!
//! Only the fields dispatch and the bundled backends read are typed; query
//! models stay opaque JSON.

use serde::{Deserialize, Serialize};

/// Time range relative to evaluation time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelativeTimeRange {
    pub from: i64,
    pub to: i64,
}

/// One query of a rule condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertQuery {
    pub ref_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    #[serde(default)]
    pub relative_time_range: RelativeTimeRange,
    #[serde(default)]
    pub datasource_uid: String,
    /// Datasource-specific query model.
    #[serde(default)]
    pub model: serde_json::Value,
}

/// Body of `POST /api/v1/eval/{recipient}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalQueriesPayload {
    pub data: Vec<AlertQuery>,
    /// Evaluation instant (RFC 3339). Defaults to the server's current time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now: Option<String>,
}

/// Condition of a natively managed rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCondition {
    /// `ref_id` of the query whose result decides the alert.
    pub condition: String,
    pub data: Vec<AlertQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now: Option<String>,
}

/// Body of `POST /api/v1/rule/test/{recipient}`.
///
/// Proxied rulers take a PromQL/LogQL `expr`; native rules take a
/// `grafana_condition`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestRulePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana_condition: Option<AlertCondition>,
}

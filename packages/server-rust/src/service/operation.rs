use axum::http::StatusCode;
use ruler_core::BackendKind;

use super::response::ApiResponse;
use crate::traits::LookupError;

/// Public operations served through the fork dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RulerOperation {
    GetAlertStatuses,
    GetRuleStatuses,
    EvaluateQueries,
    TestRule,
}

impl RulerOperation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetAlertStatuses => "get_alert_statuses",
            Self::GetRuleStatuses => "get_rule_statuses",
            Self::EvaluateQueries => "evaluate_queries",
            Self::TestRule => "test_rule",
        }
    }
}

/// Errors from classifying a request or selecting its backend.
///
/// All variants are caused by what the caller sent and are reported as 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
    #[error("failed to resolve recipient {reference}")]
    ClassificationFailed {
        reference: String,
        #[source]
        source: LookupError,
    },
    #[error("data source type {datasource_type:?} is not served by any backend")]
    UnsupportedBackend { datasource_type: String },
    #[error("unexpected backend type ({kind})")]
    UnexpectedBackend { kind: BackendKind },
}

impl DispatchError {
    /// Stable variant name for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::ClassificationFailed { .. } => "classification_failed",
            Self::UnsupportedBackend { .. } => "unsupported_backend",
            Self::UnexpectedBackend { .. } => "unexpected_backend",
        }
    }
}

impl From<DispatchError> for ApiResponse {
    fn from(err: DispatchError) -> Self {
        let cause = match &err {
            DispatchError::ClassificationFailed { source, .. } => Some(source.to_string()),
            _ => None,
        };
        ApiResponse::error(StatusCode::BAD_REQUEST, err.to_string(), cause)
    }
}

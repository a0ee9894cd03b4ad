//! Backend for Prometheus-compatible rulers (Prometheus, Loki) reached over HTTP.
//!
//! Requests are forwarded to the resolved datasource's API and the upstream
//! status, content type, and body are returned unchanged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use ruler_core::{DatasourceMeta, EvalQueriesPayload, RequestContext, TestRulePayload};

use crate::service::response::ApiResponse;
use crate::traits::{DatasourceLookup, LookupError, RulerBackend};

/// Errors raised while forwarding to an upstream ruler.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("request does not name a data source")]
    NoDatasource,
    #[error("data source lookup failed")]
    Lookup(#[from] LookupError),
    #[error("data source {uid} has an invalid url {url:?}")]
    InvalidUrl { uid: String, url: String },
    #[error("upstream request failed")]
    Upstream(#[from] reqwest::Error),
}

impl From<ProxyError> for ApiResponse {
    fn from(err: ProxyError) -> Self {
        let status = match &err {
            ProxyError::NoDatasource | ProxyError::Lookup(_) => StatusCode::BAD_REQUEST,
            ProxyError::InvalidUrl { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        let cause = std::error::Error::source(&err).map(ToString::to_string);
        ApiResponse::error(status, err.to_string(), cause)
    }
}

/// Upstream API endpoints used by the proxy.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Alerts,
    Rules,
    Query,
}

/// Path of `endpoint` on a datasource of type `kind`. Loki serves its ruler
/// API under `/prometheus` and its query API under `/loki`.
fn endpoint_path(kind: &str, endpoint: Endpoint) -> &'static str {
    match (kind, endpoint) {
        ("loki", Endpoint::Alerts) => "/prometheus/api/v1/alerts",
        ("loki", Endpoint::Rules) => "/prometheus/api/v1/rules",
        ("loki", Endpoint::Query) => "/loki/api/v1/query",
        (_, Endpoint::Alerts) => "/api/v1/alerts",
        (_, Endpoint::Rules) => "/api/v1/rules",
        (_, Endpoint::Query) => "/api/v1/query",
    }
}

// ---------------------------------------------------------------------------
// ProxyBackend
// ---------------------------------------------------------------------------

pub struct ProxyBackend {
    client: reqwest::Client,
    lookup: Arc<dyn DatasourceLookup>,
}

impl ProxyBackend {
    /// Creates a proxy whose upstream calls time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(lookup: Arc<dyn DatasourceLookup>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ruler-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, lookup })
    }

    async fn datasource(&self, ctx: &RequestContext) -> Result<DatasourceMeta, ProxyError> {
        let reference = ctx.datasource_ref().ok_or(ProxyError::NoDatasource)?;
        Ok(self.lookup.resolve(&reference).await?)
    }

    fn url(ds: &DatasourceMeta, endpoint: Endpoint) -> Result<reqwest::Url, ProxyError> {
        let raw = format!(
            "{}{}",
            ds.url.trim_end_matches('/'),
            endpoint_path(&ds.kind, endpoint)
        );
        reqwest::Url::parse(&raw).map_err(|_| ProxyError::InvalidUrl {
            uid: ds.uid.clone(),
            url: ds.url.clone(),
        })
    }

    async fn forward(
        &self,
        ctx: &RequestContext,
        endpoint: Endpoint,
        query: &[(String, String)],
    ) -> Result<ApiResponse, ProxyError> {
        let ds = self.datasource(ctx).await?;
        let url = Self::url(&ds, endpoint)?;

        let mut request = self.client.get(url).query(query);
        if !ctx.request_id.is_empty() {
            request = request.header("x-request-id", &ctx.request_id);
        }

        tracing::debug!(datasource = %ds.uid, kind = %ds.kind, ?endpoint, "forwarding to upstream ruler");
        let upstream = request.send().await?;

        let status = upstream.status();
        let content_type = upstream
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let body = upstream.bytes().await?;
        Ok(ApiResponse::raw(status, content_type, body))
    }

    async fn respond(
        &self,
        ctx: &RequestContext,
        endpoint: Endpoint,
        query: &[(String, String)],
    ) -> ApiResponse {
        self.forward(ctx, endpoint, query)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(request_id = %ctx.request_id, "proxy failed: {err}");
                err.into()
            })
    }
}

#[async_trait]
impl RulerBackend for ProxyBackend {
    async fn get_alert_statuses(&self, ctx: &RequestContext) -> ApiResponse {
        self.respond(ctx, Endpoint::Alerts, &ctx.query).await
    }

    async fn get_rule_statuses(&self, ctx: &RequestContext) -> ApiResponse {
        self.respond(ctx, Endpoint::Rules, &ctx.query).await
    }

    async fn evaluate_queries(
        &self,
        _ctx: &RequestContext,
        _payload: EvalQueriesPayload,
    ) -> ApiResponse {
        ApiResponse::error(
            StatusCode::BAD_REQUEST,
            "query evaluation is only supported for grafana managed rules",
            None,
        )
    }

    async fn test_rule(&self, ctx: &RequestContext, payload: TestRulePayload) -> ApiResponse {
        let Some(expr) = payload.expr.filter(|e| !e.trim().is_empty()) else {
            return ApiResponse::error(
                StatusCode::BAD_REQUEST,
                "invalid rule: expr is required for Prometheus-compatible rulers",
                None,
            );
        };
        self.respond(ctx, Endpoint::Query, &[("query".to_string(), expr)])
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::extract::RawQuery;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    use super::*;
    use crate::service::datasources::DatasourceCache;

    const RULES_BODY: &str = r#"{"status":"success","data":{"groups":[]}}"#;

    /// Starts a fake ruler and returns its base URL.
    async fn fake_upstream() -> String {
        let app = Router::new()
            .route(
                "/api/v1/rules",
                get(|| async { ([(CONTENT_TYPE, "application/json")], RULES_BODY) }),
            )
            .route(
                "/prometheus/api/v1/alerts",
                get(|| async { (StatusCode::IM_A_TEAPOT, "loki alerts") }),
            )
            .route(
                "/api/v1/query",
                get(|RawQuery(q): RawQuery| async move { q.unwrap_or_default() }),
            )
            .route(
                "/api/v1/alerts",
                get(|RawQuery(q): RawQuery| async move { q.unwrap_or_default() }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn proxy(base: &str) -> ProxyBackend {
        let cache = DatasourceCache::from_datasources([
            DatasourceMeta {
                id: 1,
                uid: "prom".to_string(),
                name: "Prometheus".to_string(),
                kind: "prometheus".to_string(),
                url: format!("{base}/"),
            },
            DatasourceMeta {
                id: 2,
                uid: "loki".to_string(),
                name: "Loki".to_string(),
                kind: "loki".to_string(),
                url: base.to_string(),
            },
            DatasourceMeta {
                id: 3,
                uid: "broken".to_string(),
                name: "Broken".to_string(),
                kind: "prometheus".to_string(),
                url: "not a url".to_string(),
            },
        ]);
        ProxyBackend::new(Arc::new(cache), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn loki_uses_prefixed_paths() {
        assert_eq!(endpoint_path("loki", Endpoint::Rules), "/prometheus/api/v1/rules");
        assert_eq!(endpoint_path("prometheus", Endpoint::Rules), "/api/v1/rules");
        assert_eq!(endpoint_path("loki", Endpoint::Query), "/loki/api/v1/query");
    }

    #[tokio::test]
    async fn upstream_body_is_passed_through() {
        let base = fake_upstream().await;
        let resp = proxy(&base)
            .get_rule_statuses(&RequestContext::for_recipient("prom"))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.content_type(), "application/json");
        assert_eq!(resp.body().as_ref(), RULES_BODY.as_bytes());
    }

    #[tokio::test]
    async fn upstream_status_is_passed_through() {
        let base = fake_upstream().await;
        let resp = proxy(&base)
            .get_alert_statuses(&RequestContext::for_recipient("loki"))
            .await;
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(resp.body().as_ref(), b"loki alerts");
    }

    #[tokio::test]
    async fn test_rule_sends_expr_as_query() {
        let base = fake_upstream().await;
        let payload = TestRulePayload {
            expr: Some("up".to_string()),
            grafana_condition: None,
        };
        let resp = proxy(&base)
            .test_rule(&RequestContext::for_recipient("prom"), payload)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body().as_ref(), b"query=up");
    }

    #[tokio::test]
    async fn repeated_query_keys_reach_upstream_in_order() {
        let base = fake_upstream().await;
        let mut ctx = RequestContext::for_recipient("prom");
        ctx.query = vec![
            ("match[]".to_string(), "a".to_string()),
            ("match[]".to_string(), "b".to_string()),
        ];
        let resp = proxy(&base).get_alert_statuses(&ctx).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body().as_ref(), b"match%5B%5D=a&match%5B%5D=b");
    }

    #[tokio::test]
    async fn datasource_removed_after_classification_is_client_error() {
        let resp = proxy("http://127.0.0.1:1")
            .get_rule_statuses(&RequestContext::for_recipient("gone"))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.error_body().unwrap().cause.unwrap(), "data source not found: uid:gone");
    }

    #[tokio::test]
    async fn test_rule_requires_expr() {
        let resp = proxy("http://127.0.0.1:1")
            .test_rule(&RequestContext::for_recipient("prom"), TestRulePayload::default())
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn eval_is_unsupported() {
        let resp = proxy("http://127.0.0.1:1")
            .evaluate_queries(
                &RequestContext::for_recipient("prom"),
                EvalQueriesPayload { data: Vec::new(), now: None },
            )
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_datasource_url_is_server_error() {
        let resp = proxy("http://127.0.0.1:1")
            .get_rule_statuses(&RequestContext::for_recipient("broken"))
            .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let resp = proxy(&format!("http://{addr}"))
            .get_rule_statuses(&RequestContext::for_recipient("prom"))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(resp.error_body().unwrap().message, "upstream request failed");
    }
}

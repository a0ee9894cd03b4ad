//! Network module with deferred startup lifecycle.
//!
//! `new()` wires shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, liveness_handler, readiness_handler, route_eval_queries,
    route_eval_queries_native, route_get_alert_statuses, route_get_rule_statuses,
    route_test_rule_config, AppState,
};
use super::middleware::apply_http_layers;
use super::shutdown::ShutdownController;
use crate::service::middleware::{RequireSignedInLayer, RouteMetricsLayer, TokenVerifier};
use crate::service::ForkedRulerApi;

/// How long `serve()` waits for in-flight ruler requests after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the HTTP server lifecycle.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    api: Arc<ForkedRulerApi>,
    verifier: Arc<TokenVerifier>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        api: Arc<ForkedRulerApi>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        Self {
            config,
            listener: None,
            api,
            verifier,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the router.
    ///
    /// Ruler routes (auth + metrics wrapped):
    /// - `GET /api/prometheus/{recipient}/api/v1/alerts`
    /// - `GET /api/prometheus/{recipient}/api/v1/rules`
    /// - `POST /api/v1/eval` (native rule store)
    /// - `POST /api/v1/eval/{recipient}`
    /// - `POST /api/v1/rule/test/{recipient}`
    ///
    /// Unauthenticated: `GET /health`, `GET /health/live`, `GET /health/ready`.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            api: Arc::clone(&self.api),
            shutdown: Arc::clone(&self.shutdown),
            start_time: Instant::now(),
        };

        // route_layer: applied to every route registered above it, and only
        // when a route matched. Metrics is outermost so 401s are counted too.
        let ruler = Router::new()
            .route(
                "/api/prometheus/{recipient}/api/v1/alerts",
                get(route_get_alert_statuses),
            )
            .route(
                "/api/prometheus/{recipient}/api/v1/rules",
                get(route_get_rule_statuses),
            )
            .route("/api/v1/eval", post(route_eval_queries_native))
            .route("/api/v1/eval/{recipient}", post(route_eval_queries))
            .route("/api/v1/rule/test/{recipient}", post(route_test_rule_config))
            .route_layer(RequireSignedInLayer::new(Arc::clone(&self.verifier)))
            .route_layer(RouteMetricsLayer);

        let health = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler));

        apply_http_layers(ruler.merge(health), &self.config).with_state(state)
    }

    /// Binds the listener and returns the bound port (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!("TCP listener bound to {}:{}", self.config.host, port);
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a fatal
    /// I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();
        let ctrl = Arc::clone(&self.shutdown);

        ctrl.set_ready();
        info!(backends = ?self.api.registry().kinds(), "serving ruler API");

        let drain_ctrl = Arc::clone(&ctrl);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                drain_ctrl.trigger_shutdown();
            })
            .await?;

        if ctrl.wait_for_drain(DRAIN_TIMEOUT).await {
            info!("all in-flight requests drained");
        } else {
            warn!(
                in_flight = ctrl.in_flight_count(),
                "drain timeout expired with requests still in flight"
            );
        }
        ctrl.set_stopped();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::RawQuery;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{Request, StatusCode};
    use ruler_core::{BackendKind, DatasourceMeta};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::service::backends::native::{AlertStatus, RuleGroupStatus, RuleStatus};
    use crate::service::backends::{NativeBackend, ProxyBackend};
    use crate::service::middleware::auth::tests::{token, SECRET};
    use crate::service::{BackendRegistry, DatasourceCache};

    fn module() -> NetworkModule {
        // Nothing listens here; proxied calls fail fast with 502.
        module_with_upstream("http://127.0.0.1:1")
    }

    fn module_with_upstream(prom_url: &str) -> NetworkModule {
        let lookup = Arc::new(DatasourceCache::from_datasources([
            DatasourceMeta {
                id: 1,
                uid: "prom".to_string(),
                name: "Prometheus".to_string(),
                kind: "prometheus".to_string(),
                url: prom_url.to_string(),
            },
            DatasourceMeta {
                id: 2,
                uid: "graphite".to_string(),
                name: "Graphite".to_string(),
                kind: "graphite".to_string(),
                url: String::new(),
            },
        ]));

        let native = NativeBackend::new();
        native.publish(
            3,
            vec![RuleGroupStatus {
                name: "g".to_string(),
                file: "f".to_string(),
                rules: vec![RuleStatus {
                    name: "Down".to_string(),
                    query: "A".to_string(),
                    state: "firing".to_string(),
                    health: "ok".to_string(),
                    last_error: None,
                    labels: Default::default(),
                    annotations: Default::default(),
                    alerts: vec![AlertStatus {
                        labels: Default::default(),
                        annotations: Default::default(),
                        state: "firing".to_string(),
                        active_at: None,
                        value: "1".to_string(),
                    }],
                    rule_type: "alerting".to_string(),
                }],
                interval: 10.0,
            }],
        );

        let proxy = ProxyBackend::new(lookup.clone(), Duration::from_secs(2)).unwrap();
        let registry = BackendRegistry::builder()
            .with(BackendKind::Native, Arc::new(native))
            .with(BackendKind::Proxied, Arc::new(proxy))
            .build();
        let api = Arc::new(ForkedRulerApi::new(lookup, Arc::new(registry)));
        NetworkModule::new(
            NetworkConfig::default(),
            api,
            Arc::new(TokenVerifier::hs256(SECRET)),
        )
    }

    fn authed(method: &str, uri: &str, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {}", token(SECRET, "alice", 3, 3600)));
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        builder
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn native_alerts_are_served_for_callers_org() {
        let resp = module()
            .build_router()
            .oneshot(authed("GET", "/api/prometheus/grafana/api/v1/alerts", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["data"]["alerts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ruler_routes_require_sign_in() {
        let router = module().build_router();
        for (method, uri) in [
            ("GET", "/api/prometheus/grafana/api/v1/alerts"),
            ("GET", "/api/prometheus/grafana/api/v1/rules"),
            ("POST", "/api/v1/eval"),
            ("POST", "/api/v1/eval/grafana"),
            ("POST", "/api/v1/rule/test/grafana"),
        ] {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let resp = router.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn health_routes_are_public() {
        let router = module().build_router();
        let req = Request::builder().uri("/health/live").body(Body::empty()).unwrap();
        assert_eq!(router.oneshot(req).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_recipient_is_bad_request() {
        let resp = module()
            .build_router()
            .oneshot(authed("GET", "/api/prometheus/nope/api/v1/rules", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = json_body(resp).await;
        assert_eq!(json["message"], "failed to resolve recipient uid:nope");
        assert_eq!(json["cause"], "data source not found: uid:nope");
    }

    #[tokio::test]
    async fn unsupported_datasource_type_is_bad_request() {
        let resp = module()
            .build_router()
            .oneshot(authed("GET", "/api/prometheus/graphite/api/v1/rules", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_dispatch() {
        // "nope" is unknown; a dispatch would report that instead.
        let resp = module()
            .build_router()
            .oneshot(authed("POST", "/api/v1/rule/test/nope", Some("{broken")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["message"], "bad request data");
    }

    #[tokio::test]
    async fn test_rule_for_native_validates_condition() {
        let body = r#"{"grafana_condition":{"condition":"Z","data":[{"refId":"A"}]}}"#;
        let resp = module()
            .build_router()
            .oneshot(authed("POST", "/api/v1/rule/test/grafana", Some(body)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["message"], "invalid rule");
    }

    #[tokio::test]
    async fn proxied_eval_is_rejected_by_backend() {
        let resp = module()
            .build_router()
            .oneshot(authed("POST", "/api/v1/eval/prom", Some(r#"{"data":[{"refId":"A"}]}"#)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(resp).await["message"],
            "query evaluation is only supported for grafana managed rules"
        );
    }

    #[tokio::test]
    async fn eval_without_recipient_goes_to_native_backend() {
        let router = module().build_router();

        let resp = router
            .clone()
            .oneshot(authed("POST", "/api/v1/eval", Some(r#"{"data":[{"refId":"A"}]}"#)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);

        let resp = router
            .oneshot(authed("POST", "/api/v1/eval", Some(r#"{"data":[]}"#)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["message"], "no queries to evaluate");
    }

    #[tokio::test]
    async fn repeated_query_keys_are_forwarded_to_upstream() {
        let upstream = Router::new().route(
            "/api/v1/rules",
            get(|RawQuery(q): RawQuery| async move { q.unwrap_or_default() }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });

        let resp = module_with_upstream(&format!("http://{addr}"))
            .build_router()
            .oneshot(authed(
                "GET",
                "/api/prometheus/prom/api/v1/rules?match%5B%5D=a&match%5B%5D=b",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"match%5B%5D=a&match%5B%5D=b");
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut m = module();
        let port = m.start().await.unwrap();
        assert!(port > 0);
        assert!(m.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = module().serve(std::future::ready(())).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let mut m = module();
        m.config.host = "127.0.0.1".to_string();
        m.start().await.unwrap();
        let ctrl = m.shutdown_controller();
        m.serve(std::future::ready(())).await.unwrap();
        assert_eq!(ctrl.health_state(), crate::network::HealthState::Stopped);
    }
}

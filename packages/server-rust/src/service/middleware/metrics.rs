//! Request metrics for ruler routes.
//!
//! Records a request counter and a duration histogram through the `metrics`
//! facade, labelled by method, matched route, and status, and logs each
//! completed request inside a `tracing` span. Responses pass through untouched.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::response::Response;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

pub const REQUESTS_TOTAL: &str = "ruler_api_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "ruler_api_request_duration_seconds";

// ---------------------------------------------------------------------------
// RouteMetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments every request it wraps.
#[derive(Debug, Clone, Default)]
pub struct RouteMetricsLayer;

impl<S> Layer<S> for RouteMetricsLayer {
    type Service = RouteMetrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteMetrics { inner }
    }
}

// ---------------------------------------------------------------------------
// RouteMetrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RouteMetrics<S> {
    inner: S,
}

impl<S> Service<Request> for RouteMetrics<S>
where
    S: Service<Request, Response = Response> + Send,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().to_string();
        let route = req.extensions().get::<MatchedPath>().map_or_else(
            || req.uri().path().to_string(),
            |p| p.as_str().to_string(),
        );

        let span = info_span!(
            "ruler_request",
            method = %method,
            route = %route,
            status = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let mut sample = Sample::new(method, route);
                let result = fut.await;
                if let Ok(resp) = &result {
                    sample.finish(resp.status().as_u16());
                }
                result
            }
            .instrument(span),
        )
    }
}

/// Records one request when dropped. A request whose future is dropped
/// before completing (outer timeout, client disconnect) is recorded with
/// status `cancelled`.
struct Sample {
    method: String,
    route: String,
    start: Instant,
    status: Option<u16>,
}

impl Sample {
    fn new(method: String, route: String) -> Self {
        Self {
            method,
            route,
            start: Instant::now(),
            status: None,
        }
    }

    fn finish(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn status_label(&self) -> String {
        self.status
            .map_or_else(|| "cancelled".to_string(), |s| s.to_string())
    }
}

impl Drop for Sample {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let status = self.status_label();
        let method = std::mem::take(&mut self.method);
        let route = std::mem::take(&mut self.route);

        metrics::counter!(
            REQUESTS_TOTAL,
            "method" => method.clone(),
            "route" => route.clone(),
            "status" => status.clone()
        )
        .increment(1);
        metrics::histogram!(
            REQUEST_DURATION_SECONDS,
            "method" => method,
            "route" => route,
            "status" => status.clone()
        )
        .record(elapsed.as_secs_f64());

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = elapsed.as_millis() as u64;
        let span = tracing::Span::current();
        span.record("status", status.as_str());
        span.record("duration_ms", duration_ms);
        if self.status.is_some() {
            tracing::info!(status = %status, duration_ms, "request complete");
        } else {
            tracing::warn!(duration_ms, "request cancelled before completion");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn response_passes_through_unchanged() {
        let inner = tower::service_fn(|_req: Request| async {
            Ok::<_, Infallible>((StatusCode::ACCEPTED, "payload").into_response())
        });
        let svc = RouteMetricsLayer.layer(inner);
        let req = axum::http::Request::builder()
            .uri("/api/v1/eval/grafana")
            .body(Body::empty())
            .unwrap();

        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"payload");
    }

    #[test]
    fn unfinished_sample_is_labelled_cancelled() {
        let mut sample = Sample::new("GET".to_string(), "/api/v1/eval".to_string());
        assert_eq!(sample.status_label(), "cancelled");
        sample.finish(200);
        assert_eq!(sample.status_label(), "200");
    }

    #[tokio::test]
    async fn request_dropped_by_outer_timeout_still_completes_cleanly() {
        let inner = tower::service_fn(|_req: Request| async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        });
        let svc = RouteMetricsLayer.layer(inner);
        let req = axum::http::Request::builder()
            .uri("/api/v1/eval")
            .body(Body::empty())
            .unwrap();

        let outcome =
            tokio::time::timeout(std::time::Duration::from_millis(20), svc.oneshot(req)).await;
        assert!(outcome.is_err());
    }
}

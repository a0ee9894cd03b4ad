//! Transport-level middleware applied to the whole router.
//!
//! Layers are listed outermost first: the first one sees the request first
//! and the response last.

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use super::config::NetworkConfig;

/// Header carrying the per-request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wraps `router` with the transport middleware stack:
///
/// 1. `SetRequestId` -- assigns a UUID v4 `x-request-id` unless the client sent one
/// 2. `Trace` -- one `http_request` span per request, tagged with the request id
/// 3. `CORS` -- allowed origins from configuration
/// 4. `Timeout` -- cancels the handler and answers 408 once `request_timeout` passes
/// 5. `PropagateRequestId` -- copies `x-request-id` onto the response
///
/// Route-level wrappers (auth, metrics) are added by the network module with
/// `route_layer` so they only see matched ruler routes.
pub fn apply_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        let id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        info_span!(
            "http_request",
            method = %req.method(),
            uri = %req.uri(),
            request_id = %id,
        )
    });

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(trace)
            .layer(build_cors_layer(&config.cors_origins))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout,
            ))
            .layer(PropagateRequestIdLayer::new(request_id)),
    )
}

/// A `"*"` entry allows any origin; otherwise each entry that parses as a
/// header value is allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

//! Request binding: builds the `RequestContext` and decodes JSON payloads
//! before any ruler handler runs.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, MatchedPath, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use ruler_core::RequestContext;
use serde::de::DeserializeOwned;

use crate::network::middleware::REQUEST_ID_HEADER;
use crate::service::middleware::auth::{Caller, DEFAULT_ORG_ID};
use crate::service::response::ApiResponse;

/// Extracts the `RequestContext` for a ruler route.
///
/// The `recipient` path parameter becomes the target reference; a route
/// without one yields a context whose recipient is `None`, which the
/// classifier rejects.
#[derive(Debug, Clone)]
pub struct RulerContext(pub RequestContext);

impl<S> FromRequestParts<S> for RulerContext
where
    S: Send + Sync,
{
    type Rejection = ApiResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|_| Path(HashMap::new()));
        let Query(query) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                ApiResponse::error(StatusCode::BAD_REQUEST, "invalid query string", Some(e.body_text()))
            })?;

        let caller = parts.extensions.get::<Caller>().cloned();
        let path = parts.extensions.get::<MatchedPath>().map_or_else(
            || parts.uri.path().to_string(),
            |p| p.as_str().to_string(),
        );
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(Self(RequestContext {
            request_id,
            org_id: caller.as_ref().map_or(DEFAULT_ORG_ID, |c| c.org_id),
            principal: caller.map(|c| c.principal),
            recipient: params.get("recipient").cloned(),
            method: parts.method.to_string(),
            path,
            query,
        }))
    }
}

/// JSON body decoded into `T`; malformed bodies are rejected with
/// `400 bad request data`.
#[derive(Debug, Clone)]
pub struct Bound<T>(pub T);

impl<S, T> FromRequest<S> for Bound<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(bad_request_data(&rejection)),
        }
    }
}

fn bad_request_data(rejection: &JsonRejection) -> ApiResponse {
    ApiResponse::error(
        StatusCode::BAD_REQUEST,
        "bad request data",
        Some(rejection.body_text()),
    )
}

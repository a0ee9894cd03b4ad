//! Signed-in requirement for ruler routes.
//!
//! Verifies an HS256 bearer token and stores the resulting [`Caller`] in the
//! request extensions. Requests without a valid token are answered with 401
//! before reaching the handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use ruler_core::Principal;
use serde::{Deserialize, Serialize};
use tower::{Layer, Service};

use crate::service::response::ApiResponse;

/// Organisation assumed when a token carries none.
pub const DEFAULT_ORG_ID: i64 = 1;

fn default_org_id() -> i64 {
    DEFAULT_ORG_ID
}

/// Claims read from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default = "default_org_id")]
    pub org_id: i64,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: u64,
}

/// Authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub principal: Principal,
    pub org_id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingToken,
    #[error("invalid authentication token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for ApiResponse {
    fn from(err: AuthError) -> Self {
        let cause = match &err {
            AuthError::MissingToken => None,
            AuthError::InvalidToken(e) => Some(e.to_string()),
        };
        ApiResponse::error(StatusCode::UNAUTHORIZED, err.to_string(), cause)
    }
}

// ---------------------------------------------------------------------------
// TokenVerifier
// ---------------------------------------------------------------------------

/// Verifies HS256 bearer tokens against a shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    #[must_use]
    pub fn hs256(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a raw token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for bad signatures, expired tokens,
    /// or malformed claims.
    pub fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(Caller {
            principal: Principal {
                id: data.claims.sub,
                roles: data.claims.roles,
            },
            org_id: data.claims.org_id,
        })
    }

    /// Verify the `Authorization: Bearer` header of a request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingToken` when there is no bearer token.
    pub fn verify_request(&self, req: &Request) -> Result<Caller, AuthError> {
        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

// ---------------------------------------------------------------------------
// RequireSignedInLayer
// ---------------------------------------------------------------------------

/// Tower layer rejecting requests without a valid bearer token.
#[derive(Clone)]
pub struct RequireSignedInLayer {
    verifier: Arc<TokenVerifier>,
}

impl RequireSignedInLayer {
    #[must_use]
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S> Layer<S> for RequireSignedInLayer {
    type Service = RequireSignedIn<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireSignedIn {
            inner,
            verifier: Arc::clone(&self.verifier),
        }
    }
}

#[derive(Clone)]
pub struct RequireSignedIn<S> {
    inner: S,
    verifier: Arc<TokenVerifier>,
}

impl<S> Service<Request> for RequireSignedIn<S>
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

    fn call(&mut self, mut req: Request) -> Self::Future {
        match self.verifier.verify_request(&req) {
            Ok(caller) => {
                req.extensions_mut().insert(caller);
                Box::pin(self.inner.call(req))
            }
            Err(err) => {
                tracing::debug!(path = %req.uri().path(), "rejecting request: {err}");
                let resp = ApiResponse::from(err).into_response();
                Box::pin(async move { Ok(resp) })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

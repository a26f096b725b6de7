//! HTTP middleware for API layer.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::domain::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id for the current request.
///
/// Present in the request extensions for handlers and the trace span, and
/// in the response extensions for the error boundary.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Constant-time comparison of two byte slices to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// API key authentication middleware.
/// Protects POST endpoints by requiring a valid `x-api-key` header.
/// GET requests pass through without authentication.
/// Keys are compared as SHA-256 digests in constant time.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let api_key_header = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let Some(provided) = api_key_header else {
        return AppError::unauthorized("Unauthorized")
            .with_cause(anyhow::anyhow!("missing {API_KEY_HEADER} header"))
            .into_response();
    };

    let expected_hash = Sha256::digest(state.api_auth_key.expose_secret().as_bytes());
    let provided_hash = Sha256::digest(provided.as_bytes());

    if !constant_time_eq(expected_hash.as_slice(), provided_hash.as_slice()) {
        return AppError::unauthorized("Unauthorized")
            .with_cause(anyhow::anyhow!("invalid {API_KEY_HEADER}"))
            .into_response();
    }

    next.run(request).await
}

/// Honours an incoming `x-request-id` or generates one, and echoes it back.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response<Body> {
    let incoming = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_owned);
    let id = incoming.unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(RequestId(id));
    response
}

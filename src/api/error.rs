//! HTTP error boundary.
//!
//! Handlers return [`ApiError`]. Rejected input becomes a 400
//! `{"errors": [...]}` body straight away. An [`AppError`] is stashed in the
//! response extensions and rendered once by [`error_boundary`], which is the
//! only place that logs it and decides how much detail the client sees.

use std::any::Any;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State, rejection::JsonRejection, rejection::QueryRejection},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info_span, warn};

use crate::domain::{
    AppError, ErrorResponse, UpstreamError, ValidationError, ValidationErrorResponse,
};
use crate::infra::config::Environment;
use crate::infra::observability::record_error;

use super::middleware::RequestId;

/// Error type returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// Client input failed validation; every message is reported.
    Invalid(Vec<String>),
    App(AppError),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(vec![message.into()])
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError::App(err)
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError::App(err.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::invalid(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => {
                ApiError::App(AppError::operational(413, "Request body too large"))
            }
            StatusCode::UNSUPPORTED_MEDIA_TYPE => ApiError::App(AppError::operational(
                415,
                "Content-Type must be application/json",
            )),
            _ => ApiError::invalid(rejection.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid(errors) => {
                debug!(?errors, "Request rejected by validation");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ValidationErrorResponse { errors }),
                )
                    .into_response()
            }
            ApiError::App(err) => err.into_response(),
        }
    }
}

/// Marker carrying an [`AppError`] from a handler to the boundary.
#[derive(Clone)]
struct UnhandledError(Arc<AppError>);

impl IntoResponse for AppError {
    /// Renders the production body and leaves the error for [`error_boundary`].
    fn into_response(self) -> Response {
        let mut response = body_for(&self, None);
        response
            .extensions_mut()
            .insert(UnhandledError(Arc::new(self)));
        response
    }
}

fn body_for(err: &AppError, stack: Option<String>) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse {
        stack,
        ..ErrorResponse::new(err.public_message())
    };
    (status, Json(body)).into_response()
}

/// Logs `err` and renders the client-facing response.
///
/// Operational errors keep their status and message. Anything else is a
/// 500 with a fixed message; the `stack` field is added only in development.
pub fn render_error(err: &AppError, environment: Environment) -> Response {
    let status = err.status_code();
    match err {
        AppError::Operational { message, cause, .. } => {
            warn!(status, message = %message, cause = ?cause, "Operational error");
            record_error("operational", status);
            body_for(err, None)
        }
        AppError::Unexpected(source) => {
            error!(status, message = %source, error = ?source, "Unexpected error");
            record_error("unexpected", status);
            let stack = environment
                .is_development()
                .then(|| format!("{source:?}"));
            body_for(err, stack)
        }
    }
}

/// Outermost middleware: renders any [`AppError`] a handler or inner layer produced.
///
/// Bare 405 and 408 responses from the router and the timeout layer are
/// rendered as operational errors too. Headers set further in (request id,
/// rate-limit hints, `Allow`) survive the re-render.
pub async fn error_boundary(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let mut response = next.run(request).await;
    let err = match response.extensions_mut().remove::<UnhandledError>() {
        Some(UnhandledError(err)) => err,
        None => match bare_status_error(&response) {
            Some(err) => Arc::new(err),
            None => return response,
        },
    };

    let request_id = response
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let span = info_span!("error_boundary", %method, %path, %request_id);
    let rendered = span.in_scope(|| render_error(&err, environment));

    let (mut parts, _) = response.into_parts();
    let (rendered_parts, body) = rendered.into_parts();
    parts.status = rendered_parts.status;
    parts.headers.remove(header::CONTENT_LENGTH);
    merge_headers(&mut parts.headers, rendered_parts.headers);
    Response::from_parts(parts, body)
}

/// Maps a body-less framework response to the error it stands for.
fn bare_status_error(response: &Response) -> Option<AppError> {
    if response.headers().contains_key(header::CONTENT_TYPE) {
        return None;
    }
    match response.status() {
        StatusCode::METHOD_NOT_ALLOWED => Some(AppError::operational(405, "Method not allowed")),
        StatusCode::REQUEST_TIMEOUT => Some(AppError::operational(408, "Request timed out")),
        _ => None,
    }
}

fn merge_headers(target: &mut HeaderMap, source: HeaderMap) {
    for (name, value) in source.iter() {
        target.insert(name.clone(), value.clone());
    }
}

/// Converts a caught handler panic into an unexpected error.
pub fn panic_to_error(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::unexpected(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_operational_error_keeps_status_and_message() {
        let err = AppError::not_found("Entity not found");
        let response = render_error(&err, Environment::Production);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"status": "error", "message": "Entity not found"})
        );
    }

    #[tokio::test]
    async fn test_unexpected_error_is_opaque_in_production() {
        let err = AppError::unexpected(anyhow::anyhow!("db password is hunter2"));
        let response = render_error(&err, Environment::Production);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("stack").is_none());
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_unexpected_error_has_stack_in_development() {
        let err = AppError::unexpected(anyhow::anyhow!("index out of bounds"));
        let response = render_error(&err, Environment::Development);

        let body = json_body(response).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body["stack"].as_str().unwrap().contains("index out of bounds"));
    }

    #[tokio::test]
    async fn test_operational_error_never_has_stack() {
        let err = AppError::bad_gateway("Upstream rejected the request")
            .with_cause(anyhow::anyhow!("HTTP 422"));
        let response = render_error(&err, Environment::Development);

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(json_body(response).await.get("stack").is_none());
    }

    #[tokio::test]
    async fn test_invalid_renders_all_errors() {
        let response = ApiError::Invalid(vec![
            "lat is required".to_string(),
            "lon is required".to_string(),
        ])
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"errors": ["lat is required", "lon is required"]})
        );
    }

    #[test]
    fn test_app_error_response_carries_marker() {
        let response = AppError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.extensions().get::<UnhandledError>().is_some());
    }

    #[test]
    fn test_validation_error_becomes_invalid() {
        let err: ApiError = ValidationError::InvalidBounds.into();
        assert!(matches!(err, ApiError::Invalid(errors) if errors.len() == 1));
    }

    #[test]
    fn test_bare_framework_statuses_become_errors() {
        let timed_out = StatusCode::REQUEST_TIMEOUT.into_response();
        let err = bare_status_error(&timed_out).unwrap();
        assert_eq!(err.status_code(), 408);
        assert_eq!(err.public_message(), "Request timed out");

        let not_allowed = StatusCode::METHOD_NOT_ALLOWED.into_response();
        assert_eq!(bare_status_error(&not_allowed).unwrap().status_code(), 405);

        let with_body = (StatusCode::REQUEST_TIMEOUT, Json(serde_json::json!({}))).into_response();
        assert!(bare_status_error(&with_body).is_none());
        assert!(bare_status_error(&StatusCode::NO_CONTENT.into_response()).is_none());
    }

    #[test]
    fn test_panic_payloads() {
        let response = panic_to_error(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = panic_to_error(Box::new(String::from("boom")));
        let UnhandledError(err) = response.extensions().get::<UnhandledError>().unwrap().clone();
        assert!(err.to_string().contains("boom"));

        let response = panic_to_error(Box::new(42_u8));
        assert!(!response.extensions().get::<UnhandledError>().unwrap().0.is_operational());
    }
}

//! Shared HTTP plumbing for upstream clients.

use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

use crate::domain::UpstreamError;

/// Upstream error bodies are truncated to this many characters before logging.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Configuration shared by the upstream HTTP clients.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub timeout: Duration,
    /// Extra attempts for idempotent reads after a connection failure or timeout.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_delay: Duration::from_millis(250),
        }
    }
}

impl UpstreamConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url, UpstreamError> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| UpstreamError::Connection(format!("invalid base URL '{raw}': {e}")))?;
    if url.cannot_be_a_base() {
        return Err(UpstreamError::Connection(format!(
            "base URL '{raw}' cannot carry a path"
        )));
    }
    Ok(url)
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn transport_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout(err.to_string())
    } else {
        UpstreamError::Connection(err.to_string())
    }
}

/// Sends `request` and decodes a JSON body. 404 becomes `NotFound(resource)`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    resource: &str,
) -> Result<T, UpstreamError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(UpstreamError::NotFound(resource.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| UpstreamError::Decode(e.to_string()))
}

/// Sends `request` and only checks for a success status.
pub(crate) async fn send_expect_success(request: RequestBuilder) -> Result<(), UpstreamError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(UpstreamError::Status {
            status: status.as_u16(),
            body: String::new(),
        })
    }
}

/// Runs an idempotent read, retrying connection failures and timeouts.
pub(crate) async fn with_retries<T, F, Fut>(
    config: &UpstreamConfig,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempt = 0;
    loop {
        match attempt_fn().await {
            Err(e @ (UpstreamError::Connection(_) | UpstreamError::Timeout(_)))
                if attempt < config.max_retries =>
            {
                attempt += 1;
                warn!(attempt, error = %e, operation, "Upstream call failed, retrying");
                tokio::time::sleep(config.retry_delay).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = parse_base_url("http://broker:1026/").unwrap();
        let url = endpoint(&base, &["ngsi-ld", "v1", "entities", "urn:ngsi-ld:X:a b"]);
        assert_eq!(
            url.as_str(),
            "http://broker:1026/ngsi-ld/v1/entities/urn:ngsi-ld:X:a%20b"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = parse_base_url("https://gateway.city/orion").unwrap();
        let url = endpoint(&base, &["version"]);
        assert_eq!(url.as_str(), "https://gateway.city/orion/version");
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(UpstreamError::Connection(_))
        ));
        assert!(parse_base_url("mailto:ops@city.gov").is_err());
    }

    #[tokio::test]
    async fn test_with_retries_gives_up_after_max() {
        let config = UpstreamConfig {
            retry_delay: Duration::from_millis(1),
            ..UpstreamConfig::default()
        };
        let mut calls = 0;
        let result: Result<(), _> = with_retries(&config, "test", || {
            calls += 1;
            async { Err(UpstreamError::Timeout("slow".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(UpstreamError::Timeout(_))));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_with_retries_does_not_retry_not_found() {
        let config = UpstreamConfig::default();
        let mut calls = 0;
        let result: Result<(), _> = with_retries(&config, "test", || {
            calls += 1;
            async { Err(UpstreamError::NotFound("x".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(UpstreamError::NotFound(_))));
        assert_eq!(calls, 1);
    }
}

//! Application error types.
//!
//! [`AppError`] is the only error that crosses the HTTP boundary. It is
//! either *operational* (anticipated, carries a status and a client-safe
//! message) or *unexpected* (anything else, rendered as an opaque 500).

use thiserror::Error;

/// Fixed client-facing message for every unexpected error.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum AppError {
    /// An anticipated failure raised deliberately by application logic.
    #[error("{message}")]
    Operational {
        status: u16,
        message: String,
        /// Server-side detail. Logged, never sent to the client.
        cause: Option<anyhow::Error>,
    },
    /// Any other failure. Its message is never echoed to the client.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    /// Creates an operational error with an explicit HTTP status.
    ///
    /// A status outside the 4xx/5xx error range is stored as 500.
    pub fn operational(status: u16, message: impl Into<String>) -> Self {
        AppError::Operational {
            status: error_status(status),
            message: message.into(),
            cause: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(400, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::operational(401, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::operational(403, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(404, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::operational(502, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::operational(503, message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::operational(504, message)
    }

    /// Wraps any error as an unexpected (programming) failure.
    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        AppError::Unexpected(err.into())
    }

    /// Attaches a server-side cause to an operational error.
    ///
    /// Unexpected errors already own their cause and are returned unchanged.
    #[must_use]
    pub fn with_cause(self, cause: impl Into<anyhow::Error>) -> Self {
        match self {
            AppError::Operational {
                status, message, ..
            } => AppError::Operational {
                status,
                message,
                cause: Some(cause.into()),
            },
            unexpected @ AppError::Unexpected(_) => unexpected,
        }
    }

    #[must_use]
    pub fn is_operational(&self) -> bool {
        matches!(self, AppError::Operational { .. })
    }

    /// HTTP status for this error; unexpected errors are always 500.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Operational { status, .. } => error_status(*status),
            AppError::Unexpected(_) => 500,
        }
    }

    /// The message a client is allowed to see.
    #[must_use]
    pub fn public_message(&self) -> &str {
        match self {
            AppError::Operational { message, .. } => message,
            AppError::Unexpected(_) => INTERNAL_ERROR_MESSAGE,
        }
    }
}

fn error_status(status: u16) -> u16 {
    if (400..=599).contains(&status) {
        status
    } else {
        500
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Unexpected(err.into())
    }
}

/// Input rejected by one of the standalone validators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid {field}: '{value}' is not a number")]
    InvalidFormat { field: &'static str, value: String },
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("Invalid date: '{0}'")]
    InvalidDate(String),
    #[error("Start date must not be after end date")]
    InvertedRange,
    #[error("Date range cannot exceed {max_days} days")]
    RangeTooWide { max_days: i64 },
    #[error("Bounding box must be four comma-separated numbers: minLat,minLon,maxLat,maxLon")]
    MalformedBBox,
    #[error("Invalid bounding box: minimum values must be less than maximum values")]
    InvalidBounds,
    #[error("Invalid entity id: '{0}'")]
    InvalidEntityId(String),
}

/// Failures talking to an external collaborator (context broker, agent service).
#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Upstream responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid upstream payload: {0}")]
    Decode(String),
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        match &err {
            UpstreamError::NotFound(_) => AppError::not_found("Entity not found").with_cause(err),
            UpstreamError::Connection(_) => {
                AppError::service_unavailable("Upstream service unavailable").with_cause(err)
            }
            UpstreamError::Timeout(_) => {
                AppError::gateway_timeout("Upstream service timed out").with_cause(err)
            }
            UpstreamError::Status { status, .. } if (400..500).contains(status) => {
                AppError::bad_gateway("Upstream service rejected the request").with_cause(err)
            }
            UpstreamError::Status { .. } | UpstreamError::Decode(_) => AppError::unexpected(err),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

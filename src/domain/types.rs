use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::ValidationError;

/// Default page size when `limit` is absent or unusable.
pub const DEFAULT_LIMIT: u32 = 100;
/// Largest page size the API will ever request from the broker.
pub const MAX_LIMIT: u32 = 1000;
/// Widest time window a history query may span.
pub const MAX_DATE_RANGE_DAYS: i64 = 90;

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Range-checks already numeric input.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::OutOfRange {
                field: "latitude",
                min: -90.0,
                max: 90.0,
            });
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::OutOfRange {
                field: "longitude",
                min: -180.0,
                max: 180.0,
            });
        }
        Ok(Self { lat, lon })
    }
}

/// Rectangular region, `(minLat, minLon, maxLat, maxLon)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// Closed time window, `start <= end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Clamped limit/offset pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Serializable result of a standalone validator.
///
/// `valid == true` always carries a value and no error; `valid == false`
/// always carries a non-empty message and no value.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationOutcome<T> {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ValidationOutcome<T> {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.value, self.error) {
            (Some(value), _) => Ok(value),
            (None, error) => Err(error.unwrap_or_default()),
        }
    }
}

impl<T> From<Result<T, ValidationError>> for ValidationOutcome<T> {
    fn from(result: Result<T, ValidationError>) -> Self {
        match result {
            Ok(value) => Self {
                valid: true,
                value: Some(value),
                error: None,
            },
            Err(err) => Self {
                valid: false,
                value: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Entity types the dashboard aggregates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    TrafficFlowObserved,
    WeatherObserved,
    AirQualityObserved,
    RoadAccident,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 4] = [
        EntityCategory::TrafficFlowObserved,
        EntityCategory::WeatherObserved,
        EntityCategory::AirQualityObserved,
        EntityCategory::RoadAccident,
    ];

    /// NGSI-LD entity type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::TrafficFlowObserved => "TrafficFlowObserved",
            EntityCategory::WeatherObserved => "WeatherObserved",
            EntityCategory::AirQualityObserved => "AirQualityObserved",
            EntityCategory::RoadAccident => "RoadAccident",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown entity type: {s}"))
    }
}

/// An NGSI-LD entity as returned by the context broker.
///
/// Attributes are kept opaque; the gateway does not interpret them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

/// Filters for an entity listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityQuery {
    pub category: Option<EntityCategory>,
    pub bbox: Option<BoundingBox>,
    pub pagination: Pagination,
}

/// Filters for a proximity search.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub center: Coordinates,
    pub radius_m: u32,
    pub category: Option<EntityCategory>,
    pub pagination: Pagination,
}

/// Page of results plus the window that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub count: usize,
    pub limit: u32,
    pub offset: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination) -> Self {
        Self {
            count: data.len(),
            data,
            limit: pagination.limit,
            offset: pagination.offset,
        }
    }
}

/// Request body for the AI agent endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "query must be between 1 and 2000 characters"
    ))]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 128, message = "sessionId must be at most 128 characters"))]
    pub session_id: Option<String>,
}

impl AgentRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: None,
            session_id: None,
        }
    }
}

/// Answer relayed back from the agent service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub agent: String,
    pub answer: serde_json::Value,
}

/// Error body emitted by the error boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            stack: None,
        }
    }
}

/// Error body for rejected input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationErrorResponse {
    pub errors: Vec<String>,
}

/// Health check status for services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub context_broker: HealthStatus,
    pub agent_service: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    /// The broker is essential; the agent service is not.
    pub fn new(context_broker: HealthStatus, agent_service: HealthStatus) -> Self {
        let status = match (context_broker, agent_service) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };

        Self {
            status,
            context_broker,
            agent_service,
            timestamp: Utc::now(),
        }
    }
}

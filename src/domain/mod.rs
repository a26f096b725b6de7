//! Domain layer containing validators, query rules, core types, traits and errors.

pub mod error;
pub mod rules;
pub mod traits;
pub mod types;
pub mod validation;

pub use error::{AppError, ConfigError, INTERNAL_ERROR_MESSAGE, UpstreamError, ValidationError};
pub use rules::{FieldKind, FieldRule, QueryRules};
pub use traits::{AgentClient, ContextBroker};
pub use types::{
    AgentRequest, AgentResponse, BoundingBox, Coordinates, DEFAULT_LIMIT, DateRange, Entity,
    EntityCategory, EntityQuery, ErrorResponse, HealthResponse, HealthStatus, MAX_DATE_RANGE_DAYS,
    MAX_LIMIT, NearbyQuery, PaginatedResponse, Pagination, ValidationErrorResponse,
    ValidationOutcome,
};
pub use validation::{
    is_valid_agent_name, is_valid_entity_id, validate_agent_request, validate_bbox,
    validate_coordinates, validate_date_range, validate_entity_id, validate_pagination,
};

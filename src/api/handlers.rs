//! HTTP request handlers.
//!
//! Query-rule middleware has already run by the time a handler is called;
//! the handlers apply the typed validators and translate into domain
//! queries.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::app::AppState;
use crate::domain::{
    AgentRequest, AgentResponse, AppError, Entity, EntityCategory, EntityQuery, HealthResponse,
    HealthStatus, NearbyQuery, PaginatedResponse, is_valid_agent_name, validate_agent_request,
    validate_bbox, validate_coordinates, validate_date_range, validate_entity_id,
    validate_pagination,
};

use super::error::ApiError;
use super::query::QueryParams;

/// Search radius used when `radius` is omitted, in metres.
pub const DEFAULT_RADIUS_M: u32 = 1_000;

fn category(params: &QueryParams) -> Result<Option<EntityCategory>, ApiError> {
    params
        .get("type")
        .map(|raw| raw.parse::<EntityCategory>().map_err(ApiError::invalid))
        .transpose()
}

/// List entities by type, bounding box and page.
pub async fn list_entities_handler(
    State(state): State<Arc<AppState>>,
    params: QueryParams,
) -> Result<Json<PaginatedResponse<Entity>>, ApiError> {
    let query = EntityQuery {
        category: category(&params)?,
        bbox: params.get("bbox").map(validate_bbox).transpose()?,
        pagination: validate_pagination(params.get("limit"), params.get("offset")),
    };
    Ok(Json(state.service.list_entities(&query).await?))
}

/// Get a single entity by its URN.
pub async fn get_entity_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Entity>, ApiError> {
    let id = validate_entity_id(&id)?;
    Ok(Json(state.service.get_entity(id).await?))
}

/// Temporal evolution of one entity between `from` and `to`.
pub async fn entity_history_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    params: QueryParams,
) -> Result<Json<Entity>, ApiError> {
    let id = validate_entity_id(&id)?;
    let (Some(from), Some(to)) = (params.get("from"), params.get("to")) else {
        return Err(ApiError::invalid("from and to are required"));
    };
    let range = validate_date_range(from, to)?;
    Ok(Json(state.service.entity_history(id, &range).await?))
}

/// Entities within `radius` metres of `lat`/`lon`.
pub async fn nearby_entities_handler(
    State(state): State<Arc<AppState>>,
    params: QueryParams,
) -> Result<Json<PaginatedResponse<Entity>>, ApiError> {
    let (Some(lat), Some(lon)) = (params.get("lat"), params.get("lon")) else {
        return Err(ApiError::invalid("lat and lon are required"));
    };
    let center = validate_coordinates(lat, lon)?;

    let radius_m = match params.get("radius") {
        Some(raw) => {
            let radius: f64 = raw
                .trim()
                .parse()
                .map_err(|_| ApiError::invalid("radius must be a number"))?;
            radius.round() as u32
        }
        None => DEFAULT_RADIUS_M,
    };

    let query = NearbyQuery {
        center,
        radius_m,
        category: category(&params)?,
        pagination: validate_pagination(params.get("limit"), params.get("offset")),
    };
    Ok(Json(state.service.entities_near(&query).await?))
}

/// Relay a question to one of the platform's agents.
pub async fn agent_query_handler(
    State(state): State<Arc<AppState>>,
    Path(agent): Path<String>,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Json<AgentResponse>, ApiError> {
    if !is_valid_agent_name(&agent) {
        return Err(ApiError::invalid(format!("Invalid agent name: '{agent}'")));
    }
    let Json(request) = payload?;
    validate_agent_request(&request).map_err(ApiError::Invalid)?;

    Ok(Json(state.service.ask_agent(&agent, &request).await?))
}

/// Detailed health check
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.service.health_check().await)
}

/// Kubernetes liveness probe
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape output.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, AppError> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or_else(|| AppError::not_found("Metrics recorder not installed"))
}

/// Fallback for unknown routes.
pub async fn not_found_handler() -> AppError {
    AppError::not_found("Route not found")
}

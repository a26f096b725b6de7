//! Application service layer.
//!
//! This module contains the use cases behind the REST surface. Inputs
//! arrive already validated by the API layer; upstream failures are
//! converted into [`AppError`] here.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    AgentClient, AgentRequest, AgentResponse, AppError, ContextBroker, DateRange, Entity,
    EntityQuery, HealthResponse, HealthStatus, NearbyQuery, PaginatedResponse, UpstreamError,
};

/// Application service containing core business logic.
///
/// Holds the external collaborators behind trait objects so handlers and
/// tests never see concrete clients.
///
/// # Example
///
/// ```ignore
/// let broker = Arc::new(NgsiLdBrokerClient::with_defaults(&broker_url)?);
/// let agents = Arc::new(HttpAgentClient::with_defaults(&agent_url)?);
/// let service = AppService::new(broker, agents);
///
/// let entity = service.get_entity("urn:ngsi-ld:WeatherObserved:hcm-01").await?;
/// ```
pub struct AppService {
    broker: Arc<dyn ContextBroker>,
    agents: Arc<dyn AgentClient>,
}

impl AppService {
    /// Creates a new `AppService` instance.
    #[must_use]
    pub fn new(broker: Arc<dyn ContextBroker>, agents: Arc<dyn AgentClient>) -> Self {
        Self { broker, agents }
    }

    /// Gets a single entity by its URN.
    ///
    /// # Errors
    ///
    /// Returns an operational 404 when the broker does not know the id.
    #[instrument(skip(self))]
    pub async fn get_entity(&self, id: &str) -> Result<Entity, AppError> {
        debug!(entity_id = %id, "Fetching entity");
        Ok(self.broker.get_entity(id).await?)
    }

    /// Lists entities matching type, area and page filters.
    #[instrument(skip(self, query), fields(category = ?query.category, limit = query.pagination.limit))]
    pub async fn list_entities(
        &self,
        query: &EntityQuery,
    ) -> Result<PaginatedResponse<Entity>, AppError> {
        let entities = self.broker.query_entities(query).await?;
        info!(count = entities.len(), "Entities fetched");
        Ok(PaginatedResponse::new(entities, query.pagination))
    }

    /// Lists entities within `radius_m` metres of a point.
    #[instrument(skip(self, query), fields(lat = query.center.lat, lon = query.center.lon, radius_m = query.radius_m))]
    pub async fn entities_near(
        &self,
        query: &NearbyQuery,
    ) -> Result<PaginatedResponse<Entity>, AppError> {
        let entities = self.broker.entities_near(query).await?;
        info!(count = entities.len(), "Nearby entities fetched");
        Ok(PaginatedResponse::new(entities, query.pagination))
    }

    /// Gets the temporal evolution of one entity.
    #[instrument(skip(self, range), fields(from = %range.start, to = %range.end))]
    pub async fn entity_history(&self, id: &str, range: &DateRange) -> Result<Entity, AppError> {
        Ok(self.broker.entity_history(id, range).await?)
    }

    /// Relays a request to the named agent.
    ///
    /// # Errors
    ///
    /// Returns an operational 404 "Agent not found" when the agent service
    /// does not know `agent`.
    #[instrument(skip(self, request))]
    pub async fn ask_agent(
        &self,
        agent: &str,
        request: &AgentRequest,
    ) -> Result<AgentResponse, AppError> {
        info!(query_len = request.query.len(), "Forwarding agent request");
        self.agents
            .query(agent, request)
            .await
            .map_err(|err| match err {
                UpstreamError::NotFound(_) => {
                    AppError::not_found("Agent not found").with_cause(err)
                }
                other => other.into(),
            })
    }

    /// Performs a health check on all dependencies.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let broker_health = match self.broker.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Context broker health check failed");
                HealthStatus::Unhealthy
            }
        };

        let agent_health = match self.agents.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Agent service health check failed");
                HealthStatus::Unhealthy
            }
        };

        HealthResponse::new(broker_health, agent_health)
    }
}

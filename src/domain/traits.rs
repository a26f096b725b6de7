//! Domain traits defining contracts for external systems.

use async_trait::async_trait;

use super::error::UpstreamError;
use super::types::{AgentRequest, AgentResponse, DateRange, Entity, EntityQuery, NearbyQuery};

/// NGSI-LD context broker holding the live city entities.
#[async_trait]
pub trait ContextBroker: Send + Sync {
    /// Check broker connectivity
    async fn health_check(&self) -> Result<(), UpstreamError>;

    /// Fetch a single entity by its URN
    async fn get_entity(&self, id: &str) -> Result<Entity, UpstreamError>;

    /// List entities matching the type, area and paging filters
    async fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>, UpstreamError>;

    /// List entities within a radius of a point
    async fn entities_near(&self, query: &NearbyQuery) -> Result<Vec<Entity>, UpstreamError>;

    /// Temporal representation of one entity inside a time window
    async fn entity_history(&self, id: &str, range: &DateRange) -> Result<Entity, UpstreamError>;
}

/// Service hosting the platform's AI agents.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Check agent service connectivity
    async fn health_check(&self) -> Result<(), UpstreamError>;

    /// Forward a validated request to the named agent
    async fn query(&self, agent: &str, request: &AgentRequest)
    -> Result<AgentResponse, UpstreamError>;
}

//! Mock implementations for testing.
//!
//! These mocks provide in-memory implementations of domain traits
//! that can be configured to simulate upstream failures, latency and
//! handler panics.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::{
    AgentClient, AgentRequest, AgentResponse, ContextBroker, DateRange, Entity, EntityQuery,
    NearbyQuery, Pagination, UpstreamError,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Error returned by every data call, if set.
    pub failure: Option<UpstreamError>,
    /// Panic message raised by every data call, if set.
    pub panic_message: Option<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: Option<u64>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails with `error`.
    #[must_use]
    pub fn failure(error: UpstreamError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Creates a config whose data calls panic, like a programming error would.
    #[must_use]
    pub fn panicking(message: impl Into<String>) -> Self {
        Self {
            panic_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Adds simulated latency.
    #[must_use]
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    async fn apply(&self) -> Result<(), UpstreamError> {
        if let Some(ms) = self.latency_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if let Some(message) = &self.panic_message {
            panic!("{message}");
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn paginate(entities: Vec<Entity>, pagination: Pagination) -> Vec<Entity> {
    entities
        .into_iter()
        .skip(pagination.offset as usize)
        .take(pagination.limit as usize)
        .collect()
}

/// Mock context broker for testing.
///
/// Uses an in-memory map keyed by entity id and records the last query of
/// each kind so tests can assert on what the handlers forwarded.
///
/// # Example
///
/// ```ignore
/// use urban_intelligence_api::domain::{Entity, UpstreamError};
/// use urban_intelligence_api::test_utils::{MockContextBroker, mocks::MockConfig};
///
/// let broker = MockContextBroker::new();
/// broker.insert(Entity::new("urn:ngsi-ld:WeatherObserved:w1", "WeatherObserved"));
///
/// let failing = MockContextBroker::with_config(MockConfig::failure(
///     UpstreamError::Connection("refused".to_string()),
/// ));
/// ```
pub struct MockContextBroker {
    storage: Arc<Mutex<HashMap<String, Entity>>>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
    last_query: Mutex<Option<EntityQuery>>,
    last_nearby: Mutex<Option<NearbyQuery>>,
    last_range: Mutex<Option<DateRange>>,
}

impl MockContextBroker {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
            last_query: Mutex::new(None),
            last_nearby: Mutex::new(None),
            last_range: Mutex::new(None),
        }
    }

    /// Creates a mock whose data calls fail with `error`.
    #[must_use]
    pub fn failing(error: UpstreamError) -> Self {
        Self::with_config(MockConfig::failure(error))
    }

    /// Stores an entity.
    pub fn insert(&self, entity: Entity) {
        self.storage
            .lock()
            .unwrap()
            .insert(entity.id.clone(), entity);
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn last_query(&self) -> Option<EntityQuery> {
        self.last_query.lock().unwrap().clone()
    }

    pub fn last_nearby(&self) -> Option<NearbyQuery> {
        self.last_nearby.lock().unwrap().clone()
    }

    pub fn last_range(&self) -> Option<DateRange> {
        *self.last_range.lock().unwrap()
    }

    fn increment_call_count(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Stored entities of the given type (all when `None`), ordered by id.
    fn entities_of(&self, entity_type: Option<&str>) -> Vec<Entity> {
        let storage = self.storage.lock().unwrap();
        let mut entities: Vec<Entity> = storage
            .values()
            .filter(|e| entity_type.is_none_or(|t| e.entity_type == t))
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }
}

impl Default for MockContextBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextBroker for MockContextBroker {
    async fn health_check(&self) -> Result<(), UpstreamError> {
        self.increment_call_count();

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(UpstreamError::Connection(
                "Mock broker unhealthy".to_string(),
            ));
        }
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Entity, UpstreamError> {
        self.increment_call_count();
        self.config.apply().await?;

        self.storage
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(id.to_string()))
    }

    async fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>, UpstreamError> {
        self.increment_call_count();
        *self.last_query.lock().unwrap() = Some(query.clone());
        self.config.apply().await?;

        let entity_type = query.category.map(|c| c.as_str());
        Ok(paginate(self.entities_of(entity_type), query.pagination))
    }

    async fn entities_near(&self, query: &NearbyQuery) -> Result<Vec<Entity>, UpstreamError> {
        self.increment_call_count();
        *self.last_nearby.lock().unwrap() = Some(query.clone());
        self.config.apply().await?;

        let entity_type = query.category.map(|c| c.as_str());
        Ok(paginate(self.entities_of(entity_type), query.pagination))
    }

    async fn entity_history(&self, id: &str, range: &DateRange) -> Result<Entity, UpstreamError> {
        self.increment_call_count();
        *self.last_range.lock().unwrap() = Some(*range);
        self.config.apply().await?;

        self.storage
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(id.to_string()))
    }
}

/// Mock agent service for testing.
///
/// Echoes the query back as the answer and records every request.
pub struct MockAgentClient {
    requests: Arc<Mutex<Vec<(String, AgentRequest)>>>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockAgentClient {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    /// Creates a mock whose queries fail with `error`.
    #[must_use]
    pub fn failing(error: UpstreamError) -> Self {
        Self::with_config(MockConfig::failure(error))
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Gets all forwarded requests as `(agent, request)` pairs.
    pub fn get_requests(&self) -> Vec<(String, AgentRequest)> {
        self.requests.lock().unwrap().clone()
    }

    fn increment_call_count(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for MockAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn health_check(&self) -> Result<(), UpstreamError> {
        self.increment_call_count();

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(UpstreamError::Connection(
                "Mock agent service unhealthy".to_string(),
            ));
        }
        Ok(())
    }

    async fn query(
        &self,
        agent: &str,
        request: &AgentRequest,
    ) -> Result<AgentResponse, UpstreamError> {
        self.increment_call_count();
        self.config.apply().await?;

        self.requests
            .lock()
            .unwrap()
            .push((agent.to_string(), request.clone()));

        Ok(AgentResponse {
            agent: agent.to_string(),
            answer: serde_json::json!({ "echo": request.query }),
        })
    }
}

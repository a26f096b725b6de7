//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;

use secrecy::SecretString;

use crate::domain::{AgentClient, ContextBroker};
use crate::infra::config::Environment;
use crate::infra::observability::PrometheusHandle;

use super::service::AppService;

/// Shared application state for the Axum web server.
///
/// All contained types are wrapped in `Arc` or are cheap to clone, making
/// `AppState` safe to share across async tasks.
///
/// # Example
///
/// ```ignore
/// let broker = Arc::new(NgsiLdBrokerClient::with_defaults(&broker_url)?);
/// let agents = Arc::new(HttpAgentClient::with_defaults(&agent_url)?);
/// let state = AppState::new(broker, agents, api_key).with_environment(Environment::Development);
///
/// let router = create_router(Arc::new(state));
/// ```
#[derive(Clone)]
pub struct AppState {
    /// The application service containing business logic.
    pub service: Arc<AppService>,

    /// Key required on mutating requests (`x-api-key`).
    pub api_auth_key: SecretString,

    /// Controls how much error detail reaches clients.
    pub environment: Environment,

    /// Prometheus scrape handle, when a recorder is installed.
    pub metrics: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates a new `AppState` wiring an `AppService` to the given clients.
    ///
    /// Defaults to [`Environment::Production`] and no metrics handle.
    #[must_use]
    pub fn new(
        broker: Arc<dyn ContextBroker>,
        agents: Arc<dyn AgentClient>,
        api_auth_key: SecretString,
    ) -> Self {
        Self {
            service: Arc::new(AppService::new(broker, agents)),
            api_auth_key,
            environment: Environment::Production,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Option<Arc<PrometheusHandle>>) -> Self {
        self.metrics = metrics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockAgentClient, MockContextBroker};

    fn state() -> AppState {
        AppState::new(
            Arc::new(MockContextBroker::new()),
            Arc::new(MockAgentClient::new()),
            SecretString::from("test-key".to_string()),
        )
    }

    #[test]
    fn test_app_state_defaults_to_production() {
        let state = state();
        assert_eq!(state.environment, Environment::Production);
        assert!(state.metrics.is_none());
    }

    #[test]
    fn test_app_state_is_clone() {
        let state = state().with_environment(Environment::Development);
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.service, &cloned.service));
        assert_eq!(cloned.environment, Environment::Development);
    }
}

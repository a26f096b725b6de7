//! HTTP client for the agent service.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{info, instrument};

use crate::domain::{AgentClient, AgentRequest, AgentResponse, UpstreamError};

use super::upstream::{UpstreamConfig, endpoint, parse_base_url, send_expect_success, send_json};

pub struct HttpAgentClient {
    http_client: Client,
    base_url: Url,
}

impl HttpAgentClient {
    pub fn new(base_url: &str, config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let base_url = parse_base_url(base_url)?;
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Connection(e.to_string()))?;
        info!(base_url = %base_url, "Created agent service client");
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn with_defaults(base_url: &str) -> Result<Self, UpstreamError> {
        Self::new(base_url, UpstreamConfig::default())
    }

    fn query_url(&self, agent: &str) -> Url {
        endpoint(&self.base_url, &["agents", agent, "query"])
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn health_check(&self) -> Result<(), UpstreamError> {
        let request = self.http_client.get(endpoint(&self.base_url, &["health"]));
        send_expect_success(request).await
    }

    // Agent queries are not idempotent, so no retries here.
    #[instrument(skip(self, request), fields(query_len = request.query.len()))]
    async fn query(
        &self,
        agent: &str,
        request: &AgentRequest,
    ) -> Result<AgentResponse, UpstreamError> {
        let builder = self.http_client.post(self.query_url(agent)).json(request);
        let answer: Value = send_json(builder, agent).await?;
        Ok(AgentResponse {
            agent: agent.to_string(),
            answer,
        })
    }
}

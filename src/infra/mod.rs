//! Infrastructure layer implementations.

pub mod agents;
pub mod config;
pub mod context_broker;
pub mod observability;
pub mod upstream;

pub use agents::HttpAgentClient;
pub use config::{AppConfig, Environment, RateLimitConfig};
pub use context_broker::NgsiLdBrokerClient;
pub use observability::{LogFormat, PrometheusHandle, init_logging, init_metrics_handle};
pub use upstream::UpstreamConfig;

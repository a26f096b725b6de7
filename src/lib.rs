//! Urban Intelligence API
//!
//! REST gateway for the Urban Intelligence Platform. It validates incoming
//! requests (coordinates, NGSI-LD entity ids, pagination, date ranges,
//! bounding boxes, declarative query rules), relays them to the context
//! broker and agent service, and turns every failure into a uniform
//! JSON error body.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │  handlers, routing, query rules, boundary    │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │      AppService orchestration, AppState      │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │  validators, rules, traits, types, errors    │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │  NGSI-LD broker, agent client, config, logs  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Error handling
//!
//! Handlers return [`api::ApiError`]. Invalid input is answered with
//! `400 {"errors": [...]}`. Everything else is an [`domain::AppError`]:
//! operational errors keep their status and message, unexpected ones
//! (including handler panics) become `500 {"status": "error",
//! "message": "Internal server error"}`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use urban_intelligence_api::api::create_router;
//! use urban_intelligence_api::app::AppState;
//! use urban_intelligence_api::infra::{HttpAgentClient, NgsiLdBrokerClient};
//!
//! let broker = Arc::new(NgsiLdBrokerClient::with_defaults("http://orion-ld:1026")?);
//! let agents = Arc::new(HttpAgentClient::with_defaults("http://agents:8000")?);
//! let state = Arc::new(AppState::new(broker, agents, api_key));
//!
//! let router = create_router(state);
//! axum::serve(listener, router).await?;
//! ```

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

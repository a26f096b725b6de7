//! The API layer: handlers, routing, middleware and the error boundary.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod router;

pub use error::{ApiError, error_boundary, render_error};
pub use router::{RouterConfig, build_router, create_router, create_router_with_rate_limit};

//! Application layer containing use cases and shared state.

pub mod service;
pub mod state;

pub use service::AppService;
pub use state::AppState;

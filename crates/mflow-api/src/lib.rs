//! HTTP front end for the media processing pipeline.
//!
//! Accepts job submissions and status queries and delegates all work to
//! the pipeline orchestrator; nothing is processed inline with a request.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

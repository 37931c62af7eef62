//! HTTP API module.
//!
//! This module provides the HTTP server, SSE log stream and API types for
//! the dashboard frontend.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{create_router, serve, start_server, AppState};
pub use types::*;

//! External HTTP surface: REST endpoints and the three WebSocket topics.

pub mod error;
pub mod rest;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use server::{create_router, run_server};
pub use state::{AppState, GatewayConfig};

//! Tandem Server Library - WebSocket relay for remote signing sessions
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod handlers;
pub mod relay;
pub mod routes;
pub mod state;
pub mod validation;

pub use config::Config;
pub use error::ApiError;
pub use relay::{JoinError, PeerId, RelayHub, MAX_PEERS};
pub use routes::{create_router, create_router_with_config, create_router_with_state};
pub use state::AppState;

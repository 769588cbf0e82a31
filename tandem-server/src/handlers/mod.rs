//! HTTP request handlers
//!
//! This module contains all the request handlers for the relay endpoints.

pub mod health;
pub mod remote;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use remote::remote_handler;

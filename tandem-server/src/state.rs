//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use crate::relay::RelayHub;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Live relay rooms
    pub hub: Arc<RelayHub>,
    /// Largest WebSocket message accepted from a peer
    pub max_frame_bytes: usize,
}

impl AppState {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            hub: Arc::new(RelayHub::new()),
            max_frame_bytes,
        }
    }
}

use thiserror::Error;

pub use crate::codec::DecodeError;
#[cfg(feature = "token")]
pub use crate::token::VerifyError;

/// Failure reported by the platform credential API (user cancel, no
/// matching authenticator, timeout). Carries the platform's error name and
/// message so they can be shown to the user verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct CeremonyError {
    pub name: String,
    pub message: String,
}

impl CeremonyError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// The error browsers raise when the user dismisses the prompt.
    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new("NotAllowedError", message)
    }
}

/// Network failures talking to the relying party or the relay.
#[derive(Error, Debug)]
pub enum TransportError {
    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Relying party unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Connection closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum TandemError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[cfg(feature = "token")]
    #[error("Token verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Ceremony failed: {0}")]
    Ceremony(#[from] CeremonyError),

    /// Structured error body returned by the relying party.
    #[error("Relying party returned {status} ({code}): {message}")]
    RelyingParty {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TandemError>;

//! Exit codes following sysexits.h conventions.
//!
//! These codes let scripts tell a declined signature apart from an
//! unreachable relying party.

use tandem_core::TandemError;

/// Successful execution.
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments or request).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// The signer rejected the challenge, or a token failed verification.
/// Maps to EX_DATAERR from sysexits.h.
pub const REJECTED: i32 = 65;

/// Service unavailable (relying party, relay).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// The challenge was not completed in time.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const TIMED_OUT: i32 = 75;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let code = match err.chain().find_map(|e| e.downcast_ref::<TandemError>()) {
            Some(e) => Self::classify(e),
            None => Self::classify_message(&message),
        };

        Self {
            code,
            message: Some(message),
        }
    }

    fn classify(err: &TandemError) -> i32 {
        match err {
            TandemError::Verify(_) => REJECTED,
            TandemError::Transport(_) => NETWORK_ERROR,
            TandemError::RelyingParty { status, .. } if *status >= 500 => NETWORK_ERROR,
            TandemError::RelyingParty { status: 400, .. }
            | TandemError::InvalidRequest(_)
            | TandemError::Config(_) => USAGE_ERROR,
            _ => GENERAL_ERROR,
        }
    }

    fn classify_message(message: &str) -> i32 {
        if message.contains("rejected") {
            REJECTED
        } else if message.contains("timed out") {
            TIMED_OUT
        } else if message.contains("unavailable") {
            NETWORK_ERROR
        } else {
            GENERAL_ERROR
        }
    }
}

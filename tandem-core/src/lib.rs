//! Tandem Core - cross-device WebAuthn remote signing
//!
//! This crate implements the client side of a remote-signing protocol: a
//! relying party issues a challenge, one device shows a rotating QR code,
//! a second device scans it and performs the WebAuthn ceremony, and the
//! signed result travels back through a relay or straight to the relying
//! party.
//!
//! # Components
//!
//! - [`codec`]: binary ⇄ base64url transforms for WebAuthn options and credentials
//! - [`token`]: rotating HS256 QR token keyed by the challenge secret
//! - [`session`]: relay session state machine and WebSocket driver
//! - [`collector`]: interval polling of the challenge outcome
//! - [`rp`]: relying-party HTTP client and a scripted mock
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem_core::{ChallengeCollector, HttpRelyingParty, PollResult, RelyingParty, SignRequest};
//!
//! # async fn example() -> tandem_core::Result<()> {
//! let rp = Arc::new(HttpRelyingParty::from_env()?);
//! let issued = rp.issue_challenge(&SignRequest::for_user("alice")).await?;
//!
//! let collector = ChallengeCollector::new(rp.clone());
//! match collector.collect(&issued.challenge_id).await {
//!     PollResult::Signed(assertion) => println!("signed by {}", assertion.user_id),
//!     other => println!("finished: {}", other.status()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod secret;
pub mod session;

#[cfg(feature = "token")]
pub mod token;

#[cfg(feature = "network")]
pub mod collector;
#[cfg(feature = "network")]
pub mod rp;

// Re-export main types for convenience
pub use codec::{
    CeremonyKind, Challenge, Credential, DecodeError, Envelope, WireCredential, WireEnvelope,
};
pub use error::{CeremonyError, Result, TandemError, TransportError};
pub use secret::{ChallengeSecret, ClientSecret};
pub use session::{CeremonyRoute, RemoteSession, SessionEffect, SessionEvent};

#[cfg(feature = "token")]
pub use token::{TokenClaims, VerifyError};

// Network-dependent exports (not available in Wasm)
#[cfg(feature = "network")]
pub use collector::{ChallengeCollector, CollectorConfig, PollResult, SignedAssertion};
#[cfg(feature = "network")]
pub use rp::{HttpRelyingParty, MockRelyingParty, OutcomeSource, Redirect, RelyingParty, SignRequest};
#[cfg(feature = "network")]
pub use session::SessionClient;
#[cfg(all(feature = "network", feature = "token"))]
pub use token::{DisplayHandle, TokenDisplay};

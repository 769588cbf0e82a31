//! Cross-device remote session.
//!
//! Two devices join the same relay room, keyed by challenge id. The device
//! that shows the QR code arrives first and hears `waiting`; the device that
//! scans it arrives second and both hear `ready`. A device's role is fixed
//! by the first stage event it sees:
//!
//! - **Initiator**: saw `waiting` first. Announces the peer once, then
//!   accepts exactly one relayed credential and forwards it to the relying
//!   party.
//! - **Scanner**: saw `ready` first. Runs the ceremony locally and pushes
//!   the credential over the socket instead of submitting it itself.
//!
//! [`RemoteSession`] is the transport-free state machine. The socket driver
//! lives in [`client`].

#[cfg(feature = "network")]
pub mod client;
mod frame;

#[cfg(feature = "network")]
pub use client::{remote_url, SessionClient};
pub use frame::{Frame, SessionEvent};

use tracing::{debug, warn};

use crate::codec::{decode_credential, encode_credential, CeremonyKind, Credential, DecodeError, WireCredential};
use crate::error::CeremonyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Waiting,
    Ready,
    /// A credential has been accepted or sent; nothing more is relayed.
    Responded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Undetermined,
    Initiator { peer_announced: bool },
    Scanner,
}

/// What the caller should act on after a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// The scanning device joined. Emitted once per session.
    PeerJoined,
    /// The other device left before responding.
    PeerLeft,
    /// Relayed credential, already decoded. Submit it to the relying party.
    CredentialReceived(Credential),
    /// The room already holds two peers.
    Busy,
    Closed,
    Failed,
}

/// Where a locally produced credential goes.
#[derive(Debug, Clone, PartialEq)]
pub enum CeremonyRoute {
    /// Send over the relay; the initiating device will submit it.
    SendOverSocket(WireCredential),
    /// Submit straight to the relying party.
    SubmitDirect(Credential),
}

#[derive(Debug, Clone)]
pub struct RemoteSession {
    challenge_id: String,
    expected: CeremonyKind,
    connection: ConnectionState,
    stage: Stage,
    role: Role,
}

impl RemoteSession {
    pub fn new(challenge_id: impl Into<String>, expected: CeremonyKind) -> Self {
        Self {
            challenge_id: challenge_id.into(),
            expected,
            connection: ConnectionState::Connecting,
            stage: Stage::Idle,
            role: Role::Undetermined,
        }
    }

    pub fn challenge_id(&self) -> &str {
        &self.challenge_id
    }

    pub fn expected_kind(&self) -> CeremonyKind {
        self.expected
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_initiator(&self) -> bool {
        matches!(self.role, Role::Initiator { .. })
    }

    pub fn on_open(&mut self) {
        self.connection = ConnectionState::Open;
    }

    pub fn on_close(&mut self) {
        self.connection = ConnectionState::Closed;
    }

    pub fn on_transport_error(&mut self) {
        self.connection = ConnectionState::Error;
    }

    pub fn handle_text(&mut self, text: &str) -> Result<Option<SessionEffect>, DecodeError> {
        self.handle_frame(Frame::parse(text)?)
    }

    pub fn handle_frame(&mut self, frame: Frame) -> Result<Option<SessionEffect>, DecodeError> {
        match frame {
            Frame::Event(event) => Ok(self.handle_event(event)),
            Frame::Credential(wire) => self.handle_credential(&wire),
            Frame::Unknown(value) => {
                debug!(challenge_id = %self.challenge_id, frame = %value, "Ignoring unknown frame");
                Ok(None)
            }
        }
    }

    fn handle_event(&mut self, event: SessionEvent) -> Option<SessionEffect> {
        match event {
            SessionEvent::Connecting => None,
            SessionEvent::Waiting => {
                if self.role == Role::Undetermined {
                    self.role = Role::Initiator {
                        peer_announced: false,
                    };
                }
                match self.stage {
                    Stage::Responded => None,
                    Stage::Ready => {
                        self.stage = Stage::Waiting;
                        Some(SessionEffect::PeerLeft)
                    }
                    _ => {
                        self.stage = Stage::Waiting;
                        None
                    }
                }
            }
            SessionEvent::Ready => {
                if self.stage == Stage::Responded {
                    return None;
                }
                self.stage = Stage::Ready;
                match self.role {
                    Role::Undetermined => {
                        self.role = Role::Scanner;
                        None
                    }
                    Role::Initiator {
                        peer_announced: false,
                    } => {
                        self.role = Role::Initiator {
                            peer_announced: true,
                        };
                        Some(SessionEffect::PeerJoined)
                    }
                    _ => None,
                }
            }
            SessionEvent::Busy => {
                self.connection = ConnectionState::Closed;
                Some(SessionEffect::Busy)
            }
            SessionEvent::Closed => {
                self.connection = ConnectionState::Closed;
                Some(SessionEffect::Closed)
            }
            SessionEvent::Error => {
                self.connection = ConnectionState::Error;
                Some(SessionEffect::Failed)
            }
        }
    }

    fn handle_credential(&mut self, wire: &WireCredential) -> Result<Option<SessionEffect>, DecodeError> {
        if !self.is_initiator() {
            warn!(challenge_id = %self.challenge_id, "Ignoring credential relayed before waiting");
            return Ok(None);
        }
        if self.stage == Stage::Responded {
            warn!(challenge_id = %self.challenge_id, "Ignoring duplicate relayed credential");
            return Ok(None);
        }

        let credential = decode_credential(wire, self.expected)?;
        self.stage = Stage::Responded;
        debug!(challenge_id = %self.challenge_id, "Accepted relayed credential");
        Ok(Some(SessionEffect::CredentialReceived(credential)))
    }

    /// Decides where the outcome of a local ceremony goes. A platform
    /// failure is returned untouched and leaves the session as it was.
    pub fn route_ceremony(
        &mut self,
        outcome: Result<Credential, CeremonyError>,
    ) -> Result<CeremonyRoute, CeremonyError> {
        let credential = outcome?;

        if self.role == Role::Scanner
            && self.stage == Stage::Ready
            && self.connection == ConnectionState::Open
        {
            self.stage = Stage::Responded;
            return Ok(CeremonyRoute::SendOverSocket(encode_credential(&credential)));
        }

        Ok(CeremonyRoute::SubmitDirect(credential))
    }
}

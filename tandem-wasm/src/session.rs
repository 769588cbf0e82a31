//! Browser handle on [`RemoteSession`].
//!
//! The page owns the WebSocket and calls in from its `onopen`, `onmessage`,
//! `onclose` and `onerror` handlers. Every answer is a JSON string.

use serde_json::{json, Value};
use tandem_core::codec::{decode_credential, encode_credential, WireCredential};
use tandem_core::session::{Frame, Role, Stage};
use tandem_core::{CeremonyError, CeremonyKind, CeremonyRoute, RemoteSession, SessionEffect};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmRemoteSession {
    inner: RemoteSession,
}

impl WasmRemoteSession {
    pub fn create(challenge_id: &str, kind: &str) -> Result<Self, String> {
        let kind: CeremonyKind = kind.parse().map_err(|e: tandem_core::DecodeError| e.to_string())?;
        Ok(Self {
            inner: RemoteSession::new(challenge_id, kind),
        })
    }
}

fn effect_json(effect: Option<SessionEffect>) -> Value {
    match effect {
        None => json!({ "effect": null }),
        Some(SessionEffect::PeerJoined) => json!({ "effect": "peer_joined" }),
        Some(SessionEffect::PeerLeft) => json!({ "effect": "peer_left" }),
        Some(SessionEffect::CredentialReceived(credential)) => json!({
            "effect": "credential",
            "credential": encode_credential(&credential),
        }),
        Some(SessionEffect::Busy) => json!({ "effect": "busy" }),
        Some(SessionEffect::Closed) => json!({ "effect": "closed" }),
        Some(SessionEffect::Failed) => json!({ "effect": "failed" }),
    }
}

fn ceremony_error_json(err: &CeremonyError) -> Value {
    json!({ "error": { "name": err.name, "message": err.message } })
}

#[wasm_bindgen]
impl WasmRemoteSession {
    /// `kind` is `webauthn.create` or `webauthn.get`.
    #[wasm_bindgen(constructor)]
    pub fn new(challenge_id: &str, kind: &str) -> Result<WasmRemoteSession, JsValue> {
        Self::create(challenge_id, kind).map_err(|e| JsValue::from_str(&e))
    }

    pub fn on_open(&mut self) {
        self.inner.on_open();
    }

    pub fn on_close(&mut self) {
        self.inner.on_close();
    }

    pub fn on_error(&mut self) {
        self.inner.on_transport_error();
    }

    /// Feeds one received text frame. Returns `{"effect": ...}`, with the
    /// wire credential attached for `"credential"`, or `{"error": ...}`.
    pub fn handle_frame(&mut self, text: &str) -> String {
        match self.inner.handle_text(text) {
            Ok(effect) => effect_json(effect).to_string(),
            Err(e) => json!({ "error": e.to_string() }).to_string(),
        }
    }

    /// Routes a wire credential produced on this device. Returns
    /// `{"route": "socket", "frame": text}` when it must be sent over the
    /// relay, `{"route": "direct", "credential": wire}` when the page should
    /// submit it itself.
    pub fn route_credential(&mut self, wire_json: &str) -> String {
        let routed = serde_json::from_str::<WireCredential>(wire_json)
            .map_err(|e| e.to_string())
            .and_then(|wire| {
                decode_credential(&wire, self.inner.expected_kind()).map_err(|e| e.to_string())
            })
            .map(|credential| self.inner.route_ceremony(Ok(credential)));

        match routed {
            Ok(Ok(CeremonyRoute::SendOverSocket(wire))) => {
                json!({ "route": "socket", "frame": Frame::Credential(wire).to_text() }).to_string()
            }
            Ok(Ok(CeremonyRoute::SubmitDirect(credential))) => {
                json!({ "route": "direct", "credential": encode_credential(&credential) }).to_string()
            }
            Ok(Err(e)) => ceremony_error_json(&e).to_string(),
            Err(e) => json!({ "error": e }).to_string(),
        }
    }

    /// Reports a failed local ceremony (`NotAllowedError`, ...). The
    /// failure is handed back unchanged and nothing is sent.
    pub fn route_failure(&mut self, name: &str, message: &str) -> String {
        let outcome = Err(CeremonyError::new(name, message));
        match self.inner.route_ceremony(outcome) {
            Ok(_) => json!({ "error": "unexpected route" }).to_string(),
            Err(e) => ceremony_error_json(&e).to_string(),
        }
    }

    pub fn challenge_id(&self) -> String {
        self.inner.challenge_id().to_string()
    }

    pub fn stage(&self) -> String {
        match self.inner.stage() {
            Stage::Idle => "idle",
            Stage::Waiting => "waiting",
            Stage::Ready => "ready",
            Stage::Responded => "responded",
        }
        .to_string()
    }

    pub fn role(&self) -> String {
        match self.inner.role() {
            Role::Undetermined => "undetermined",
            Role::Initiator { .. } => "initiator",
            Role::Scanner => "scanner",
        }
        .to_string()
    }

    pub fn is_initiator(&self) -> bool {
        self.inner.is_initiator()
    }
}

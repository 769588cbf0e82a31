//! WebSocket driver for [`RemoteSession`].

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{CeremonyRoute, Frame, RemoteSession, SessionEffect, Stage};
use crate::codec::{CeremonyKind, Credential};
use crate::error::{CeremonyError, Result, TransportError};

/// Relay endpoint for a challenge: `ws(s)://{host}/api/v1/remote/{id}`.
pub fn remote_url(base: &Url, challenge_id: &str) -> Result<Url> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidResponse(format!("cannot derive relay URL from {base}")))?;
    url.set_path(&format!("/api/v1/remote/{challenge_id}"));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// One device's connection to a relay room. No reconnect: a dropped socket
/// ends the session.
pub struct SessionClient {
    session: RemoteSession,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl SessionClient {
    #[instrument(skip_all, fields(challenge_id = %challenge_id))]
    pub async fn connect(relay: &Url, challenge_id: &str, expected: CeremonyKind) -> Result<Self> {
        let url = remote_url(relay, challenge_id)?;
        let mut session = RemoteSession::new(challenge_id, expected);

        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))?;
        session.on_open();
        info!(url = %url, "Joined relay room");

        Ok(Self { session, socket })
    }

    pub fn session(&self) -> &RemoteSession {
        &self.session
    }

    async fn step(&mut self) -> Result<Option<SessionEffect>> {
        match self.socket.next().await {
            Some(Ok(Message::Text(text))) => Ok(self.session.handle_text(&text)?),
            Some(Ok(Message::Close(_))) | None => {
                self.session.on_close();
                Ok(Some(SessionEffect::Closed))
            }
            Some(Ok(_)) => Ok(None),
            Some(Err(e)) => {
                self.session.on_transport_error();
                warn!(error = %e, "Relay socket failed");
                Err(TransportError::Socket(e.to_string()).into())
            }
        }
    }

    /// Reads frames until one produces an effect. Socket closure yields
    /// [`SessionEffect::Closed`].
    pub async fn next_effect(&mut self) -> Result<SessionEffect> {
        loop {
            if let Some(effect) = self.step().await? {
                debug!(effect = ?effect, "Session effect");
                return Ok(effect);
            }
        }
    }

    /// Reads frames until the session reaches `stage`. Effects seen on the
    /// way are dropped; a busy room or a closed socket is an error.
    pub async fn wait_for(&mut self, stage: Stage) -> Result<()> {
        while self.session.stage() != stage {
            match self.step().await? {
                Some(SessionEffect::Busy) => {
                    return Err(TransportError::Unavailable("relay room is busy".to_string()).into())
                }
                Some(SessionEffect::Closed) | Some(SessionEffect::Failed) => {
                    return Err(TransportError::Closed.into())
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Routes a local ceremony outcome. Sends it over the relay when this
    /// device scanned the code; otherwise hands it back for direct
    /// submission to the relying party.
    pub async fn complete_ceremony(
        &mut self,
        outcome: std::result::Result<Credential, CeremonyError>,
    ) -> Result<Option<Credential>> {
        match self.session.route_ceremony(outcome)? {
            CeremonyRoute::SendOverSocket(wire) => {
                let text = Frame::Credential(wire).to_text();
                self.socket
                    .send(Message::Text(text.into()))
                    .await
                    .map_err(|e| TransportError::Socket(e.to_string()))?;
                debug!("Relayed credential to initiating device");
                Ok(None)
            }
            CeremonyRoute::SubmitDirect(credential) => Ok(Some(credential)),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.session.on_close();
        self.socket
            .close(None)
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))?;
        Ok(())
    }
}

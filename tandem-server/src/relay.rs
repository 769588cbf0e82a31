//! Room registry for the WebSocket relay.
//!
//! A room is keyed by challenge id and holds at most two peers. Joining
//! announces `waiting` to a lone peer and `ready` to both once the second
//! arrives. Text frames from one peer are forwarded verbatim to the other.
//! When a peer leaves, the one left behind is told `waiting` again; an empty
//! room is dropped.

use dashmap::DashMap;
use tandem_core::session::{Frame, SessionEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MAX_PEERS: usize = 2;

/// Outbound queue depth per peer.
const PEER_QUEUE: usize = 32;

pub type PeerId = Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("room {0} is full")]
    Busy(String),
}

struct Peer {
    id: PeerId,
    tx: mpsc::Sender<String>,
}

impl Peer {
    fn deliver(&self, text: &str) {
        if let Err(e) = self.tx.try_send(text.to_string()) {
            warn!(peer = %self.id, error = %e, "Dropping frame for slow or closed peer");
        }
    }
}

#[derive(Default)]
struct Room {
    peers: Vec<Peer>,
}

impl Room {
    fn broadcast(&self, text: &str) {
        for peer in &self.peers {
            peer.deliver(text);
        }
    }

    fn announce(&self) {
        let event = if self.peers.len() >= MAX_PEERS {
            SessionEvent::Ready
        } else {
            SessionEvent::Waiting
        };
        self.broadcast(&Frame::event_text(event));
    }
}

#[derive(Default)]
pub struct RelayHub {
    rooms: DashMap<String, Room>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer to the room and returns its outbound frame queue. The
    /// join announcement is already queued when this returns.
    pub fn join(&self, room_id: &str) -> Result<(PeerId, mpsc::Receiver<String>), JoinError> {
        let mut room = self.rooms.entry(room_id.to_string()).or_default();
        if room.peers.len() >= MAX_PEERS {
            return Err(JoinError::Busy(room_id.to_string()));
        }

        let (tx, rx) = mpsc::channel(PEER_QUEUE);
        let id = Uuid::new_v4();
        room.peers.push(Peer { id, tx });
        room.announce();

        info!(room = %room_id, peer = %id, peers = room.peers.len(), "Peer joined");
        Ok((id, rx))
    }

    /// Forwards a text frame to every other peer in the room.
    pub fn forward(&self, room_id: &str, from: PeerId, text: &str) {
        if let Some(room) = self.rooms.get(room_id) {
            for peer in room.peers.iter().filter(|p| p.id != from) {
                peer.deliver(text);
            }
            debug!(room = %room_id, from = %from, bytes = text.len(), "Frame relayed");
        }
    }

    pub fn leave(&self, room_id: &str, peer: PeerId) {
        let empty = match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                room.peers.retain(|p| p.id != peer);
                if !room.peers.is_empty() {
                    room.announce();
                }
                room.peers.is_empty()
            }
            None => false,
        };

        if empty {
            self.rooms.remove_if(room_id, |_, room| room.peers.is_empty());
        }
        info!(room = %room_id, peer = %peer, "Peer left");
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |r| r.peers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(e: SessionEvent) -> String {
        Frame::event_text(e)
    }

    #[tokio::test]
    async fn test_first_peer_waits() {
        let hub = RelayHub::new();
        let (_, mut rx) = hub.join("r").unwrap();
        assert_eq!(rx.recv().await.unwrap(), event(SessionEvent::Waiting));
        assert_eq!(hub.peer_count("r"), 1);
    }

    #[tokio::test]
    async fn test_second_peer_makes_both_ready() {
        let hub = RelayHub::new();
        let (_, mut first) = hub.join("r").unwrap();
        let (_, mut second) = hub.join("r").unwrap();

        assert_eq!(first.recv().await.unwrap(), event(SessionEvent::Waiting));
        assert_eq!(first.recv().await.unwrap(), event(SessionEvent::Ready));
        assert_eq!(second.recv().await.unwrap(), event(SessionEvent::Ready));
    }

    #[tokio::test]
    async fn test_third_peer_is_busy() {
        let hub = RelayHub::new();
        let _a = hub.join("r").unwrap();
        let _b = hub.join("r").unwrap();
        assert_eq!(hub.join("r").unwrap_err(), JoinError::Busy("r".into()));
        assert_eq!(hub.peer_count("r"), 2);
    }

    #[tokio::test]
    async fn test_forward_skips_sender() {
        let hub = RelayHub::new();
        let (a, mut rx_a) = hub.join("r").unwrap();
        let (_, mut rx_b) = hub.join("r").unwrap();
        rx_a.recv().await.unwrap();
        rx_a.recv().await.unwrap();
        rx_b.recv().await.unwrap();

        hub.forward("r", a, r#"{"response":{}}"#);
        assert_eq!(rx_b.recv().await.unwrap(), r#"{"response":{}}"#);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_reannounces_waiting_and_drops_empty_room() {
        let hub = RelayHub::new();
        let (a, _rx_a) = hub.join("r").unwrap();
        let (b, mut rx_b) = hub.join("r").unwrap();
        rx_b.recv().await.unwrap();

        hub.leave("r", a);
        assert_eq!(rx_b.recv().await.unwrap(), event(SessionEvent::Waiting));
        assert_eq!(hub.room_count(), 1);

        hub.leave("r", b);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let hub = RelayHub::new();
        let (a, _rx_a) = hub.join("one").unwrap();
        let (_, mut rx_b) = hub.join("two").unwrap();
        rx_b.recv().await.unwrap();

        hub.forward("one", a, "hello");
        assert!(rx_b.try_recv().is_err());
    }
}

//! Relay tests over real sockets.
//!
//! Each test binds the router to an ephemeral port and connects WebSocket
//! clients to it.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tandem_core::codec::{
    AssertionCredential, AssertionResponse, AttestationResponse, RegistrationCredential,
};
use tandem_core::session::{Frame, Role, SessionEvent, Stage};
use tandem_core::{CeremonyError, CeremonyKind, Credential, SessionClient, SessionEffect};
use tandem_server::create_router;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP: Duration = Duration::from_secs(5);

async fn spawn_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router()).await.unwrap();
    });
    addr
}

async fn join(addr: SocketAddr, room: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/api/v1/remote/{room}"))
        .await
        .unwrap();
    ws
}

async fn next_text(ws: &mut Client) -> String {
    loop {
        let message = timeout(STEP, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket ended")
            .unwrap();
        if let Message::Text(text) = message {
            return text.as_str().to_string();
        }
    }
}

fn event(e: SessionEvent) -> String {
    Frame::event_text(e)
}

fn assertion() -> AssertionCredential {
    AssertionCredential {
        id: Some("AQID".into()),
        raw_id: Some(vec![1, 2, 3]),
        type_: Some("public-key".into()),
        response: AssertionResponse {
            client_data_json: Some(br#"{"type":"webauthn.get"}"#.to_vec()),
            authenticator_data: Some(vec![0x05; 37]),
            signature: Some(vec![0x30, 0x45]),
            user_handle: None,
        },
        ..Default::default()
    }
}

// ============================================================================
// Raw Frame Tests
// ============================================================================

#[tokio::test]
async fn test_pairing_announces_waiting_then_ready() {
    let addr = spawn_relay().await;

    let mut first = join(addr, "pair").await;
    assert_eq!(next_text(&mut first).await, event(SessionEvent::Waiting));

    let mut second = join(addr, "pair").await;
    assert_eq!(next_text(&mut first).await, event(SessionEvent::Ready));
    assert_eq!(next_text(&mut second).await, event(SessionEvent::Ready));
}

#[tokio::test]
async fn test_text_frames_are_forwarded_verbatim() {
    let addr = spawn_relay().await;

    let mut first = join(addr, "fwd").await;
    next_text(&mut first).await;
    let mut second = join(addr, "fwd").await;
    next_text(&mut first).await;
    next_text(&mut second).await;

    let payload = r#"{"response":{"signature":"MEU"},"id":"AQID"}"#;
    second.send(Message::Text(payload.into())).await.unwrap();
    assert_eq!(next_text(&mut first).await, payload);
}

#[tokio::test]
async fn test_third_peer_gets_busy() {
    let addr = spawn_relay().await;

    let mut first = join(addr, "full").await;
    next_text(&mut first).await;
    let _second = join(addr, "full").await;
    next_text(&mut first).await;

    let mut third = join(addr, "full").await;
    assert_eq!(next_text(&mut third).await, event(SessionEvent::Busy));
}

#[tokio::test]
async fn test_remaining_peer_waits_after_other_leaves() {
    let addr = spawn_relay().await;

    let mut first = join(addr, "leave").await;
    next_text(&mut first).await;
    let mut second = join(addr, "leave").await;
    next_text(&mut first).await;
    next_text(&mut second).await;

    second.close(None).await.unwrap();
    assert_eq!(next_text(&mut first).await, event(SessionEvent::Waiting));
}

// ============================================================================
// Session Client Tests
// ============================================================================

#[tokio::test]
async fn test_session_clients_relay_credential_to_initiator() {
    let addr = spawn_relay().await;
    let relay = Url::parse(&format!("http://{addr}")).unwrap();

    let mut initiator = SessionClient::connect(&relay, "flow", CeremonyKind::Get)
        .await
        .unwrap();
    timeout(STEP, initiator.wait_for(Stage::Waiting))
        .await
        .unwrap()
        .unwrap();

    let mut scanner = SessionClient::connect(&relay, "flow", CeremonyKind::Get)
        .await
        .unwrap();
    timeout(STEP, scanner.wait_for(Stage::Ready))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scanner.session().role(), Role::Scanner);

    let joined = timeout(STEP, initiator.next_effect()).await.unwrap().unwrap();
    assert_eq!(joined, SessionEffect::PeerJoined);

    let credential = Credential::Assertion(assertion());
    let direct = scanner.complete_ceremony(Ok(credential.clone())).await.unwrap();
    assert!(direct.is_none(), "scanner should relay, not submit");

    let received = timeout(STEP, initiator.next_effect()).await.unwrap().unwrap();
    assert_eq!(received, SessionEffect::CredentialReceived(credential));
    assert_eq!(initiator.session().stage(), Stage::Responded);

    scanner.close().await.unwrap();
    initiator.close().await.unwrap();
}

#[tokio::test]
async fn test_session_clients_relay_registration_for_create_challenge() {
    let addr = spawn_relay().await;
    let relay = Url::parse(&format!("http://{addr}")).unwrap();

    let mut initiator = SessionClient::connect(&relay, "enrol", CeremonyKind::Create)
        .await
        .unwrap();
    timeout(STEP, initiator.wait_for(Stage::Waiting))
        .await
        .unwrap()
        .unwrap();
    let mut scanner = SessionClient::connect(&relay, "enrol", CeremonyKind::Create)
        .await
        .unwrap();
    timeout(STEP, scanner.wait_for(Stage::Ready))
        .await
        .unwrap()
        .unwrap();
    let joined = timeout(STEP, initiator.next_effect()).await.unwrap().unwrap();
    assert_eq!(joined, SessionEffect::PeerJoined);

    let credential = Credential::Registration(RegistrationCredential {
        id: Some("BAUG".into()),
        raw_id: Some(vec![4, 5, 6]),
        type_: Some("public-key".into()),
        response: AttestationResponse {
            client_data_json: Some(br#"{"type":"webauthn.create"}"#.to_vec()),
            attestation_object: Some(vec![0xa3, 0x63]),
            transports: Some(vec!["hybrid".into()]),
        },
        ..Default::default()
    });
    assert!(scanner.complete_ceremony(Ok(credential.clone())).await.unwrap().is_none());

    let received = timeout(STEP, initiator.next_effect()).await.unwrap().unwrap();
    assert_eq!(received, SessionEffect::CredentialReceived(credential));

    scanner.close().await.unwrap();
    initiator.close().await.unwrap();
}

#[tokio::test]
async fn test_scanner_ceremony_failure_is_not_relayed() {
    let addr = spawn_relay().await;
    let relay = Url::parse(&format!("http://{addr}")).unwrap();

    let mut initiator = SessionClient::connect(&relay, "cancel", CeremonyKind::Get)
        .await
        .unwrap();
    timeout(STEP, initiator.wait_for(Stage::Waiting))
        .await
        .unwrap()
        .unwrap();
    let mut scanner = SessionClient::connect(&relay, "cancel", CeremonyKind::Get)
        .await
        .unwrap();
    timeout(STEP, scanner.wait_for(Stage::Ready))
        .await
        .unwrap()
        .unwrap();

    let err = scanner
        .complete_ceremony(Err(CeremonyError::not_allowed("user cancelled")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("NotAllowedError"));
}

#[tokio::test]
async fn test_session_client_reports_busy_room() {
    let addr = spawn_relay().await;
    let relay = Url::parse(&format!("http://{addr}")).unwrap();

    let mut first = SessionClient::connect(&relay, "crowd", CeremonyKind::Create)
        .await
        .unwrap();
    timeout(STEP, first.wait_for(Stage::Waiting))
        .await
        .unwrap()
        .unwrap();
    let mut second = SessionClient::connect(&relay, "crowd", CeremonyKind::Create)
        .await
        .unwrap();
    timeout(STEP, second.wait_for(Stage::Ready))
        .await
        .unwrap()
        .unwrap();

    let mut third = SessionClient::connect(&relay, "crowd", CeremonyKind::Create)
        .await
        .unwrap();
    let result = timeout(STEP, third.wait_for(Stage::Ready)).await.unwrap();
    assert!(result.is_err());
}

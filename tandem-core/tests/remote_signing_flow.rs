//! End-to-end remote signing against the in-memory relying party.
//!
//! Two `RemoteSession`s stand in for the two devices; frames are handed
//! between them the way the relay forwards them.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tandem_core::codec::{
    encode_assertion, encode_credential, AssertionCredential, AssertionResponse,
    AttestationResponse, CeremonyOptions, RegistrationCredential, SignData, WireChallenge,
    WireSignData,
};
use tandem_core::rp::RelyingPartyConfig;
use tandem_core::session::{Frame, Role, Stage};
use tandem_core::token::{self, token_from_url};
use tandem_core::{
    CeremonyKind, CeremonyRoute, ChallengeCollector, Credential, MockRelyingParty, OutcomeSource,
    HttpRelyingParty, PollResult, Redirect, RelyingParty, RemoteSession,
    SessionEffect, SessionEvent, SignRequest, TokenDisplay,
};
use url::Url;

fn assertion() -> AssertionCredential {
    AssertionCredential {
        id: Some("AQID".into()),
        raw_id: Some(vec![1, 2, 3]),
        type_: Some("public-key".into()),
        response: AssertionResponse {
            client_data_json: Some(br#"{"type":"webauthn.get","challenge":"AAEC"}"#.to_vec()),
            authenticator_data: Some(vec![0x05; 37]),
            signature: Some(vec![0x30, 0x44]),
            user_handle: Some(b"alice".to_vec()),
        },
        ..Default::default()
    }
}

fn event(e: SessionEvent) -> Frame {
    Frame::Event(e)
}

#[tokio::test(start_paused = true)]
async fn test_full_remote_signing_flow() {
    let rp = Arc::new(MockRelyingParty::new());

    // Relying party issues a challenge for a sign request.
    let request = SignRequest::for_user("alice").with_sign_data(SignData {
        text: "Transfer 10 EUR".into(),
        data: Some(b"tx:42".to_vec()),
    });
    let issued = rp.issue_challenge(&request).await.unwrap();

    // Initiating device shows the rotating QR code.
    let base = Url::parse("https://rp.example.com").unwrap();
    let display = TokenDisplay::new(&issued.challenge_id, issued.secret.clone(), base)
        .start()
        .unwrap();
    let scanned = display.current();
    assert_eq!(scanned.path(), "/authenticator");

    // Relying party side: the scanned token must verify under the secret.
    let token = token_from_url(&scanned).unwrap();
    let claims = token::verify(&token, &issued.secret).unwrap();
    assert_eq!(claims.challenge_id, issued.challenge_id);
    display.stop();

    // Scanner fetches the challenge it was sent to.
    let rp = Arc::new(
        MockRelyingParty::new().with_challenge(
            &claims.challenge_id,
            WireChallenge {
                kind: "webauthn.get".into(),
                public_key: json!({ "challenge": "AAEC", "userVerification": "required" }),
                sign_data: Some(WireSignData {
                    text: "Transfer 10 EUR".into(),
                    data: Some("dHg6NDI=".into()),
                }),
                ..Default::default()
            },
        ),
    );
    let challenge = rp.fetch_challenge(&claims.challenge_id).await.unwrap();
    assert_eq!(challenge.kind(), CeremonyKind::Get);
    assert_eq!(
        challenge.sign_data.as_ref().and_then(|s| s.data.as_deref()),
        Some(&b"tx:42"[..])
    );

    // Both devices join the relay room.
    let mut initiator = RemoteSession::new(&claims.challenge_id, challenge.kind());
    let mut scanner = RemoteSession::new(&claims.challenge_id, challenge.kind());
    initiator.on_open();
    assert_eq!(initiator.handle_frame(event(SessionEvent::Waiting)).unwrap(), None);
    scanner.on_open();
    assert_eq!(
        initiator.handle_frame(event(SessionEvent::Ready)).unwrap(),
        Some(SessionEffect::PeerJoined)
    );
    assert_eq!(scanner.handle_frame(event(SessionEvent::Ready)).unwrap(), None);
    assert_eq!(scanner.role(), Role::Scanner);

    // Scanner signs and pushes the credential through the relay.
    let wire = match scanner
        .route_ceremony(Ok(Credential::Assertion(assertion())))
        .unwrap()
    {
        CeremonyRoute::SendOverSocket(wire) => wire,
        other => panic!("scanner should relay, got {other:?}"),
    };
    let relayed = Frame::parse(&Frame::Credential(wire).to_text()).unwrap();

    // Initiator decodes it and forwards it to the relying party.
    let credential = match initiator.handle_frame(relayed).unwrap() {
        Some(SessionEffect::CredentialReceived(c)) => c,
        other => panic!("initiator should receive credential, got {other:?}"),
    };
    assert_eq!(credential, Credential::Assertion(assertion()));
    assert_eq!(initiator.stage(), Stage::Responded);

    let submitted = encode_assertion(&assertion());
    rp.submit(&claims.challenge_id, &submitted).await.unwrap();
    assert_eq!(rp.submissions(), vec![(claims.challenge_id.clone(), submitted)]);

    // Relying party has verified it; the collector sees the signed outcome.
    rp.push_outcome(PollResult::Viewed);
    rp.push_outcome(PollResult::from_response(
        200,
        json!({ "status": "signed", "challengeId": claims.challenge_id, "userId": "alice" })
            .to_string()
            .as_bytes(),
    ));
    let source: Arc<dyn OutcomeSource> = rp.clone();
    match ChallengeCollector::new(source).collect(&claims.challenge_id).await {
        PollResult::Signed(signed) => assert_eq!(signed.user_id, "alice"),
        other => panic!("expected signed outcome, got {other:?}"),
    }
    assert_eq!(rp.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_challenge_is_collected_as_rejected() {
    let rp = Arc::new(MockRelyingParty::new().with_challenge(
        "c9",
        WireChallenge {
            kind: "webauthn.get".into(),
            public_key: json!({ "challenge": "AAEC" }),
            ..Default::default()
        },
    ));
    rp.reject("c9").await.unwrap();

    let source: Arc<dyn OutcomeSource> = rp.clone();
    let mut collection = ChallengeCollector::new(source).poll("c9");
    assert_eq!(collection.next().await, Some(PollResult::Rejected));
    assert_eq!(collection.next().await, None);
}

// ============================================================================
// Registration against an HTTP relying party
// ============================================================================

const THIRTY_TWO_BYTES: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

type Submitted = Arc<Mutex<Option<Value>>>;

async fn stub_relying_party(submitted: Submitted) -> Url {
    let app = Router::new()
        .route(
            "/api/v1/sign",
            post(|| async { Json(json!({ "challenge_id": "abc", "secret": "s3cr3t" })) }),
        )
        .route(
            "/api/v1/challenge/abc",
            get(|| async {
                Json(json!({
                    "type": "webauthn.create",
                    "publicKey": {
                        "challenge": THIRTY_TWO_BYTES,
                        "rp": { "id": "rp.example.com", "name": "Example" },
                        "user": { "id": "YWxpY2U", "name": "alice" },
                        "pubKeyCredParams": [{ "type": "public-key", "alg": -7 }]
                    },
                    "app": { "name": "Example" }
                }))
            })
            .post(|State(submitted): State<Submitted>, Json(body): Json<Value>| async move {
                *submitted.lock().unwrap() = Some(body);
                Json(json!({ "redirect": "" }))
            }),
        )
        .with_state(submitted);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

fn registration() -> RegistrationCredential {
    RegistrationCredential {
        id: Some("CQgHBg".into()),
        raw_id: Some(vec![9, 8, 7, 6]),
        type_: Some("public-key".into()),
        response: AttestationResponse {
            client_data_json: Some(br#"{"type":"webauthn.create"}"#.to_vec()),
            attestation_object: Some(vec![0xa3, 0x63, 0x66, 0x6d, 0x74]),
            transports: Some(vec!["hybrid".into()]),
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_registration_flow_over_http_closes_on_empty_redirect() {
    let submitted = Submitted::default();
    let base = stub_relying_party(submitted.clone()).await;
    let mut config = RelyingPartyConfig::new(base.clone());
    config.max_retries = 0;
    let rp = HttpRelyingParty::new(config).unwrap();

    let issued = rp.issue_challenge(&SignRequest::for_user("alice")).await.unwrap();
    assert_eq!(issued.challenge_id, "abc");
    assert_eq!(issued.secret.expose(), "s3cr3t");

    let display = TokenDisplay::new("abc", issued.secret.clone(), base).start().unwrap();
    let token = token_from_url(&display.current()).unwrap();
    assert_eq!(token::verify(&token, &issued.secret).unwrap().challenge_id, "abc");
    display.stop();

    let challenge = rp.fetch_challenge("abc").await.unwrap();
    assert_eq!(challenge.kind(), CeremonyKind::Create);
    match &challenge.options {
        CeremonyOptions::Create(options) => {
            assert_eq!(options.challenge, (0u8..32).collect::<Vec<u8>>());
            assert_eq!(options.user.as_ref().unwrap().id, b"alice".to_vec());
        }
        other => panic!("expected creation options, got {other:?}"),
    }

    // The relayed registration arrives at an initiator built for this challenge.
    let mut initiator = RemoteSession::new("abc", challenge.kind());
    let mut scanner = RemoteSession::new("abc", challenge.kind());
    initiator.on_open();
    scanner.on_open();
    initiator.handle_frame(event(SessionEvent::Waiting)).unwrap();
    initiator.handle_frame(event(SessionEvent::Ready)).unwrap();
    scanner.handle_frame(event(SessionEvent::Ready)).unwrap();

    let credential = Credential::Registration(registration());
    let wire = match scanner.route_ceremony(Ok(credential.clone())).unwrap() {
        CeremonyRoute::SendOverSocket(wire) => wire,
        other => panic!("scanner should relay, got {other:?}"),
    };
    let relayed = Frame::parse(&Frame::Credential(wire).to_text()).unwrap();
    let received = match initiator.handle_frame(relayed).unwrap() {
        Some(SessionEffect::CredentialReceived(c)) => c,
        other => panic!("initiator should receive credential, got {other:?}"),
    };
    assert_eq!(received, credential);

    let encoded = encode_credential(&received);
    let redirect = rp.submit("abc", &encoded).await.unwrap();
    assert_eq!(redirect, Redirect::Close);

    let body = submitted.lock().unwrap().clone().expect("credential was posted");
    assert_eq!(body["rawId"], "CQgHBg");
    assert_eq!(body["response"]["clientDataJSON"], "eyJ0eXBlIjoid2ViYXV0aG4uY3JlYXRlIn0");
    assert_eq!(body["response"]["attestationObject"], "o2NmbXQ");
    assert!(body["response"].get("signature").is_none());
}

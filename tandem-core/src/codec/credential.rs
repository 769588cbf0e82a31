//! Public-key credentials returned by the authenticator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::challenge::CeremonyKind;
use super::options::AuthenticatorAttachment;
use super::{decode_b64url_opt, encode_b64url, DecodeError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttestationResponse {
    pub client_data_json: Option<Vec<u8>>,
    pub attestation_object: Option<Vec<u8>>,
    pub transports: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionResponse {
    pub client_data_json: Option<Vec<u8>>,
    pub authenticator_data: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    pub user_handle: Option<Vec<u8>>,
}

/// Result of a create ceremony.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationCredential {
    pub id: Option<String>,
    pub raw_id: Option<Vec<u8>>,
    pub type_: Option<String>,
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    pub response: AttestationResponse,
    pub client_extension_results: Option<Value>,
}

/// Result of a get ceremony.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionCredential {
    pub id: Option<String>,
    pub raw_id: Option<Vec<u8>>,
    pub type_: Option<String>,
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    pub response: AssertionResponse,
    pub client_extension_results: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    Registration(RegistrationCredential),
    Assertion(AssertionCredential),
}

impl Credential {
    pub fn kind(&self) -> CeremonyKind {
        match self {
            Credential::Registration(_) => CeremonyKind::Create,
            Credential::Assertion(_) => CeremonyKind::Get,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Credential::Registration(c) => c.id.as_deref(),
            Credential::Assertion(c) => c.id.as_deref(),
        }
    }
}

/// Response half of a wire credential. Union of the attestation and
/// assertion fields; which ones may be present depends on the ceremony.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAuthenticatorResponse {
    #[serde(rename = "clientDataJSON", default, skip_serializing_if = "Option::is_none")]
    pub client_data_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

/// JSON form of either credential, as posted to the relying party and
/// relayed between devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    pub response: WireAuthenticatorResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_extension_results: Option<Value>,
}

pub fn encode_registration(credential: &RegistrationCredential) -> WireCredential {
    let r = &credential.response;
    WireCredential {
        id: credential.id.clone(),
        raw_id: credential.raw_id.as_deref().map(encode_b64url),
        type_: credential.type_.clone(),
        authenticator_attachment: credential.authenticator_attachment,
        response: WireAuthenticatorResponse {
            client_data_json: r.client_data_json.as_deref().map(encode_b64url),
            attestation_object: r.attestation_object.as_deref().map(encode_b64url),
            transports: r.transports.clone(),
            ..Default::default()
        },
        client_extension_results: credential.client_extension_results.clone(),
    }
}

pub fn encode_assertion(credential: &AssertionCredential) -> WireCredential {
    let r = &credential.response;
    WireCredential {
        id: credential.id.clone(),
        raw_id: credential.raw_id.as_deref().map(encode_b64url),
        type_: credential.type_.clone(),
        authenticator_attachment: credential.authenticator_attachment,
        response: WireAuthenticatorResponse {
            client_data_json: r.client_data_json.as_deref().map(encode_b64url),
            authenticator_data: r.authenticator_data.as_deref().map(encode_b64url),
            signature: r.signature.as_deref().map(encode_b64url),
            user_handle: r.user_handle.as_deref().map(encode_b64url),
            ..Default::default()
        },
        client_extension_results: credential.client_extension_results.clone(),
    }
}

pub fn encode_credential(credential: &Credential) -> WireCredential {
    match credential {
        Credential::Registration(c) => encode_registration(c),
        Credential::Assertion(c) => encode_assertion(c),
    }
}

fn reject_present(
    present: bool,
    field: &'static str,
    kind: CeremonyKind,
) -> Result<(), DecodeError> {
    if present {
        Err(DecodeError::UnexpectedField { field, kind })
    } else {
        Ok(())
    }
}

pub fn decode_registration(wire: &WireCredential) -> Result<RegistrationCredential, DecodeError> {
    let r = &wire.response;
    let kind = CeremonyKind::Create;
    reject_present(r.authenticator_data.is_some(), "response.authenticatorData", kind)?;
    reject_present(r.signature.is_some(), "response.signature", kind)?;
    reject_present(r.user_handle.is_some(), "response.userHandle", kind)?;

    Ok(RegistrationCredential {
        id: wire.id.clone(),
        raw_id: decode_b64url_opt("rawId", wire.raw_id.as_ref())?,
        type_: wire.type_.clone(),
        authenticator_attachment: wire.authenticator_attachment,
        response: AttestationResponse {
            client_data_json: decode_b64url_opt(
                "response.clientDataJSON",
                r.client_data_json.as_ref(),
            )?,
            attestation_object: decode_b64url_opt(
                "response.attestationObject",
                r.attestation_object.as_ref(),
            )?,
            transports: r.transports.clone(),
        },
        client_extension_results: wire.client_extension_results.clone(),
    })
}

pub fn decode_assertion(wire: &WireCredential) -> Result<AssertionCredential, DecodeError> {
    let r = &wire.response;
    let kind = CeremonyKind::Get;
    reject_present(r.attestation_object.is_some(), "response.attestationObject", kind)?;
    reject_present(r.transports.is_some(), "response.transports", kind)?;

    Ok(AssertionCredential {
        id: wire.id.clone(),
        raw_id: decode_b64url_opt("rawId", wire.raw_id.as_ref())?,
        type_: wire.type_.clone(),
        authenticator_attachment: wire.authenticator_attachment,
        response: AssertionResponse {
            client_data_json: decode_b64url_opt(
                "response.clientDataJSON",
                r.client_data_json.as_ref(),
            )?,
            authenticator_data: decode_b64url_opt(
                "response.authenticatorData",
                r.authenticator_data.as_ref(),
            )?,
            signature: decode_b64url_opt("response.signature", r.signature.as_ref())?,
            user_handle: decode_b64url_opt("response.userHandle", r.user_handle.as_ref())?,
        },
        client_extension_results: wire.client_extension_results.clone(),
    })
}

/// Decodes a wire credential as the ceremony it is expected to answer.
pub fn decode_credential(
    wire: &WireCredential,
    expected: CeremonyKind,
) -> Result<Credential, DecodeError> {
    match expected {
        CeremonyKind::Create => decode_registration(wire).map(Credential::Registration),
        CeremonyKind::Get => decode_assertion(wire).map(Credential::Assertion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_assertion() -> AssertionCredential {
        AssertionCredential {
            id: Some("cred-1".into()),
            raw_id: Some(vec![0xfa, 0xce]),
            type_: Some("public-key".into()),
            authenticator_attachment: Some(AuthenticatorAttachment::CrossPlatform),
            response: AssertionResponse {
                client_data_json: Some(br#"{"type":"webauthn.get"}"#.to_vec()),
                authenticator_data: Some(vec![0x49; 37]),
                signature: Some(vec![0x30, 0x45, 0x02]),
                user_handle: None,
            },
            client_extension_results: Some(json!({})),
        }
    }

    #[test]
    fn test_assertion_wire_shape() {
        let json = serde_json::to_value(encode_assertion(&sample_assertion())).unwrap();
        assert_eq!(json["rawId"], "-s4");
        assert_eq!(json["type"], "public-key");
        assert_eq!(json["authenticatorAttachment"], "cross-platform");
        assert!(json["response"]["clientDataJSON"].is_string());
        assert!(json["response"].get("userHandle").is_none());
        assert!(json["response"].get("attestationObject").is_none());
    }

    #[test]
    fn test_assertion_user_handle_presence_kept() {
        let mut credential = sample_assertion();
        credential.response.user_handle = Some(Vec::new());
        let wire = encode_assertion(&credential);
        assert_eq!(wire.response.user_handle.as_deref(), Some(""));
        assert_eq!(
            decode_assertion(&wire).unwrap().response.user_handle,
            Some(Vec::new())
        );
    }

    #[test]
    fn test_registration_rejects_assertion_fields() {
        let wire = encode_assertion(&sample_assertion());
        assert_eq!(
            decode_registration(&wire).unwrap_err(),
            DecodeError::UnexpectedField {
                field: "response.authenticatorData",
                kind: CeremonyKind::Create,
            }
        );
    }

    #[test]
    fn test_assertion_rejects_attestation_fields() {
        let wire = encode_registration(&RegistrationCredential {
            response: AttestationResponse {
                attestation_object: Some(vec![1]),
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(matches!(
            decode_credential(&wire, CeremonyKind::Get),
            Err(DecodeError::UnexpectedField { kind: CeremonyKind::Get, .. })
        ));
    }

    #[test]
    fn test_decode_browser_json() {
        let wire: WireCredential = serde_json::from_value(json!({
            "id": "AAEC",
            "rawId": "AAEC",
            "type": "public-key",
            "response": {
                "clientDataJSON": "e30",
                "attestationObject": "oA",
                "transports": ["internal", "hybrid"]
            },
            "clientExtensionResults": {}
        }))
        .unwrap();

        match decode_credential(&wire, CeremonyKind::Create).unwrap() {
            Credential::Registration(c) => {
                assert_eq!(c.raw_id, Some(vec![0, 1, 2]));
                assert_eq!(c.response.client_data_json, Some(b"{}".to_vec()));
                assert_eq!(c.response.attestation_object, Some(vec![0xa0]));
                assert_eq!(c.response.transports.unwrap().len(), 2);
            }
            other => panic!("expected registration, got {other:?}"),
        }
    }

    #[test]
    fn test_credential_kind() {
        let credential = Credential::Assertion(sample_assertion());
        assert_eq!(credential.kind(), CeremonyKind::Get);
        assert_eq!(credential.id(), Some("cred-1"));
    }
}

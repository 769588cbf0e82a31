//! Credential creation and request options.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{decode_b64url, encode_b64url, DecodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyance {
    None,
    Indirect,
    Direct,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticatorAttachment {
    #[serde(rename = "platform")]
    Platform,
    #[serde(rename = "cross-platform")]
    CrossPlatform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    Discouraged,
    Preferred,
    Required,
}

/// Relying-party entity. Contains no binary data, so native and wire forms
/// are the same type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelyingPartyEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: String,
    pub alg: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<ResidentKeyRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_resident_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerification>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserEntity {
    pub id: Vec<u8>,
    pub name: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUserEntity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    pub type_: String,
    pub id: Vec<u8>,
    pub transports: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCredentialDescriptor {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

/// Options for `navigator.credentials.create`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreationOptions {
    pub rp: Option<RelyingPartyEntity>,
    pub user: Option<UserEntity>,
    pub challenge: Vec<u8>,
    pub pub_key_cred_params: Option<Vec<PubKeyCredParam>>,
    /// Milliseconds.
    pub timeout: Option<u64>,
    pub exclude_credentials: Option<Vec<CredentialDescriptor>>,
    pub authenticator_selection: Option<AuthenticatorSelection>,
    pub attestation: Option<AttestationConveyance>,
    pub extensions: Option<Value>,
    /// Members this codec has no binary mapping for (`hints`, ...), kept verbatim.
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCreationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp: Option<RelyingPartyEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<WireUserEntity>,
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_key_cred_params: Option<Vec<PubKeyCredParam>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_credentials: Option<Vec<WireCredentialDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<AttestationConveyance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options for `navigator.credentials.get`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub challenge: Vec<u8>,
    /// Milliseconds.
    pub timeout: Option<u64>,
    pub rp_id: Option<String>,
    pub allow_credentials: Option<Vec<CredentialDescriptor>>,
    pub user_verification: Option<UserVerification>,
    pub extensions: Option<Value>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequestOptions {
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<Vec<WireCredentialDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn encode_descriptors(list: &[CredentialDescriptor]) -> Vec<WireCredentialDescriptor> {
    list.iter()
        .map(|d| WireCredentialDescriptor {
            type_: d.type_.clone(),
            id: encode_b64url(&d.id),
            transports: d.transports.clone(),
        })
        .collect()
}

fn decode_descriptors(
    field: &str,
    list: &[WireCredentialDescriptor],
) -> Result<Vec<CredentialDescriptor>, DecodeError> {
    list.iter()
        .enumerate()
        .map(|(i, d)| {
            Ok(CredentialDescriptor {
                type_: d.type_.clone(),
                id: decode_b64url(&format!("{field}[{i}].id"), &d.id)?,
                transports: d.transports.clone(),
            })
        })
        .collect()
}

pub fn encode_creation_options(options: &CreationOptions) -> WireCreationOptions {
    WireCreationOptions {
        rp: options.rp.clone(),
        user: options.user.as_ref().map(|u| WireUserEntity {
            id: encode_b64url(&u.id),
            name: u.name.clone(),
            display_name: u.display_name.clone(),
        }),
        challenge: encode_b64url(&options.challenge),
        pub_key_cred_params: options.pub_key_cred_params.clone(),
        timeout: options.timeout,
        exclude_credentials: options
            .exclude_credentials
            .as_deref()
            .map(encode_descriptors),
        authenticator_selection: options.authenticator_selection.clone(),
        attestation: options.attestation,
        extensions: options.extensions.clone(),
        extra: options.extra.clone(),
    }
}

pub fn decode_creation_options(wire: &WireCreationOptions) -> Result<CreationOptions, DecodeError> {
    let user = wire
        .user
        .as_ref()
        .map(|u| -> Result<UserEntity, DecodeError> {
            Ok(UserEntity {
                id: decode_b64url("user.id", &u.id)?,
                name: u.name.clone(),
                display_name: u.display_name.clone(),
            })
        })
        .transpose()?;

    Ok(CreationOptions {
        rp: wire.rp.clone(),
        user,
        challenge: decode_b64url("challenge", &wire.challenge)?,
        pub_key_cred_params: wire.pub_key_cred_params.clone(),
        timeout: wire.timeout,
        exclude_credentials: wire
            .exclude_credentials
            .as_deref()
            .map(|l| decode_descriptors("excludeCredentials", l))
            .transpose()?,
        authenticator_selection: wire.authenticator_selection.clone(),
        attestation: wire.attestation,
        extensions: wire.extensions.clone(),
        extra: wire.extra.clone(),
    })
}

pub fn encode_request_options(options: &RequestOptions) -> WireRequestOptions {
    WireRequestOptions {
        challenge: encode_b64url(&options.challenge),
        timeout: options.timeout,
        rp_id: options.rp_id.clone(),
        allow_credentials: options.allow_credentials.as_deref().map(encode_descriptors),
        user_verification: options.user_verification,
        extensions: options.extensions.clone(),
        extra: options.extra.clone(),
    }
}

pub fn decode_request_options(wire: &WireRequestOptions) -> Result<RequestOptions, DecodeError> {
    Ok(RequestOptions {
        challenge: decode_b64url("challenge", &wire.challenge)?,
        timeout: wire.timeout,
        rp_id: wire.rp_id.clone(),
        allow_credentials: wire
            .allow_credentials
            .as_deref()
            .map(|l| decode_descriptors("allowCredentials", l))
            .transpose()?,
        user_verification: wire.user_verification,
        extensions: wire.extensions.clone(),
        extra: wire.extra.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_creation() -> CreationOptions {
        CreationOptions {
            rp: Some(RelyingPartyEntity {
                id: Some("example.com".into()),
                name: Some("Example".into()),
            }),
            user: Some(UserEntity {
                id: vec![0xfb, 0xff, 0x01],
                name: Some("alice".into()),
                display_name: Some("Alice".into()),
            }),
            challenge: (0u8..32).collect(),
            pub_key_cred_params: Some(vec![PubKeyCredParam {
                type_: "public-key".into(),
                alg: -7,
            }]),
            timeout: Some(60_000),
            exclude_credentials: Some(vec![CredentialDescriptor {
                type_: "public-key".into(),
                id: vec![7; 16],
                transports: Some(vec!["usb".into(), "nfc".into()]),
            }]),
            authenticator_selection: Some(AuthenticatorSelection {
                authenticator_attachment: Some(AuthenticatorAttachment::CrossPlatform),
                user_verification: Some(UserVerification::Required),
                ..Default::default()
            }),
            attestation: Some(AttestationConveyance::Direct),
            extensions: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_creation_options_preserve_user() {
        let options = sample_creation();
        let wire = encode_creation_options(&options);
        assert_eq!(wire.user.as_ref().unwrap().id, "-_8B");
        assert_eq!(decode_creation_options(&wire).unwrap(), options);
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let options = RequestOptions {
            challenge: vec![1],
            ..Default::default()
        };
        let json = serde_json::to_value(encode_request_options(&options)).unwrap();
        assert_eq!(json, json!({ "challenge": "AQ" }));
    }

    #[test]
    fn test_creation_options_keep_wire_members_as_sent() {
        let sent = json!({
            "challenge": "AAEC",
            "rp": { "id": "example.org" },
            "user": { "id": "AQ" },
            "pubKeyCredParams": [],
            "hints": ["hybrid"]
        });
        let wire: WireCreationOptions = serde_json::from_value(sent.clone()).unwrap();
        let options = decode_creation_options(&wire).unwrap();
        assert_eq!(options.user.as_ref().unwrap().name, None);
        assert_eq!(options.extra["hints"], json!(["hybrid"]));

        let resent = serde_json::to_value(encode_creation_options(&options)).unwrap();
        assert_eq!(resent, sent);
    }

    #[test]
    fn test_request_options_keep_unknown_members() {
        let sent = json!({ "challenge": "AQ", "hints": ["security-key"], "mediation": "optional" });
        let wire: WireRequestOptions = serde_json::from_value(sent.clone()).unwrap();
        let options = decode_request_options(&wire).unwrap();
        assert_eq!(options.extra.len(), 2);
        assert_eq!(serde_json::to_value(encode_request_options(&options)).unwrap(), sent);
    }

    #[test]
    fn test_empty_challenge_encodes_to_empty_string() {
        let wire = encode_request_options(&RequestOptions::default());
        assert_eq!(wire.challenge, "");
        assert!(decode_request_options(&wire).unwrap().challenge.is_empty());
    }

    #[test]
    fn test_wire_json_field_names() {
        let json = serde_json::to_value(encode_creation_options(&sample_creation())).unwrap();
        assert_eq!(json["pubKeyCredParams"][0]["type"], "public-key");
        assert_eq!(
            json["authenticatorSelection"]["authenticatorAttachment"],
            "cross-platform"
        );
        assert_eq!(json["user"]["displayName"], "Alice");
        assert_eq!(json["excludeCredentials"][0]["transports"], json!(["usb", "nfc"]));
    }

    #[test]
    fn test_decode_request_options_from_relying_party_json() {
        let wire: WireRequestOptions = serde_json::from_value(json!({
            "challenge": "3q2-7w",
            "timeout": 300000,
            "rpId": "localhost",
            "allowCredentials": [{ "type": "public-key", "id": "AAEC" }],
            "userVerification": "preferred"
        }))
        .unwrap();

        let options = decode_request_options(&wire).unwrap();
        assert_eq!(options.challenge, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(options.allow_credentials.unwrap()[0].id, vec![0, 1, 2]);
        assert_eq!(options.user_verification, Some(UserVerification::Preferred));
    }

    #[test]
    fn test_bad_descriptor_id_names_the_field() {
        let wire = WireRequestOptions {
            challenge: "AA".into(),
            allow_credentials: Some(vec![
                WireCredentialDescriptor {
                    type_: "public-key".into(),
                    id: "AAEC".into(),
                    transports: None,
                },
                WireCredentialDescriptor {
                    type_: "public-key".into(),
                    id: "not base64!".into(),
                    transports: None,
                },
            ]),
            ..Default::default()
        };

        match decode_request_options(&wire).unwrap_err() {
            DecodeError::Base64 { field, .. } => assert_eq!(field, "allowCredentials[1].id"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

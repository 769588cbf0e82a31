//! WebAuthn option and credential codec.
//!
//! Native structures carry raw bytes; their wire twins carry base64url text
//! so they can travel as JSON between the relying party, the relay and the
//! browser. Every binary field is mapped individually and optional fields
//! keep their presence across the transform: absent stays absent.
//!
//! ```
//! use tandem_core::codec::{self, Envelope, RequestOptions};
//!
//! let options = RequestOptions {
//!     challenge: vec![0xde, 0xad, 0xbe, 0xef],
//!     ..Default::default()
//! };
//! let wire = codec::encode(&Envelope::RequestOptions(options.clone()));
//! assert_eq!(codec::decode(&wire).unwrap(), Envelope::RequestOptions(options));
//! ```

mod challenge;
mod credential;
mod options;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use thiserror::Error;

pub use challenge::{
    App, CeremonyKind, CeremonyOptions, Challenge, SignData, WireChallenge, WireSignData,
};
pub use credential::{
    decode_assertion, decode_credential, decode_registration, encode_assertion,
    encode_credential, encode_registration, AssertionCredential, AssertionResponse,
    AttestationResponse, Credential, RegistrationCredential, WireAuthenticatorResponse,
    WireCredential,
};
pub use options::{
    decode_creation_options, decode_request_options, encode_creation_options,
    encode_request_options, AttestationConveyance, AuthenticatorAttachment,
    AuthenticatorSelection, CreationOptions, CredentialDescriptor, PubKeyCredParam,
    RelyingPartyEntity, RequestOptions, ResidentKeyRequirement, UserEntity, UserVerification,
    WireCreationOptions, WireCredentialDescriptor, WireRequestOptions, WireUserEntity,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("field `{field}` is not valid base64: {reason}")]
    Base64 { field: String, reason: String },

    #[error("malformed JSON: {0}")]
    Json(String),

    #[error("field `{field}` is not allowed in a {kind} credential")]
    UnexpectedField {
        field: &'static str,
        kind: CeremonyKind,
    },

    #[error("unknown challenge type `{0}`")]
    UnknownCeremony(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}

/// One of the four transformable WebAuthn shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    CreationOptions(CreationOptions),
    RequestOptions(RequestOptions),
    CreationResult(RegistrationCredential),
    RequestResult(AssertionCredential),
}

/// Text-safe counterpart of [`Envelope`].
#[derive(Debug, Clone, PartialEq)]
pub enum WireEnvelope {
    CreationOptions(WireCreationOptions),
    RequestOptions(WireRequestOptions),
    CreationResult(WireCredential),
    RequestResult(WireCredential),
}

pub fn encode(envelope: &Envelope) -> WireEnvelope {
    match envelope {
        Envelope::CreationOptions(o) => WireEnvelope::CreationOptions(encode_creation_options(o)),
        Envelope::RequestOptions(o) => WireEnvelope::RequestOptions(encode_request_options(o)),
        Envelope::CreationResult(c) => WireEnvelope::CreationResult(encode_registration(c)),
        Envelope::RequestResult(c) => WireEnvelope::RequestResult(encode_assertion(c)),
    }
}

pub fn decode(wire: &WireEnvelope) -> Result<Envelope, DecodeError> {
    Ok(match wire {
        WireEnvelope::CreationOptions(o) => Envelope::CreationOptions(decode_creation_options(o)?),
        WireEnvelope::RequestOptions(o) => Envelope::RequestOptions(decode_request_options(o)?),
        WireEnvelope::CreationResult(c) => Envelope::CreationResult(decode_registration(c)?),
        WireEnvelope::RequestResult(c) => Envelope::RequestResult(decode_assertion(c)?),
    })
}

/// Unpadded base64url, the alphabet every binary WebAuthn field uses in JSON.
pub fn encode_b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Accepts both padded and unpadded input.
pub fn decode_b64url(field: &str, text: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD
        .decode(text.trim_end_matches('='))
        .map_err(|e| DecodeError::Base64 {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn decode_b64url_opt(
    field: &str,
    text: Option<&String>,
) -> Result<Option<Vec<u8>>, DecodeError> {
    text.map(|t| decode_b64url(field, t)).transpose()
}

/// Standard padded base64, used for opaque sign data as the relying party
/// stores it.
pub(crate) fn encode_b64std(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn decode_b64std(field: &str, text: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(text).map_err(|e| DecodeError::Base64 {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

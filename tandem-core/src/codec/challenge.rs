//! Challenge records as served by the relying party.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::options::{
    decode_creation_options, decode_request_options, encode_creation_options,
    encode_request_options, CreationOptions, RequestOptions, UserVerification,
    WireCreationOptions, WireRequestOptions,
};
use super::{decode_b64std, encode_b64std, DecodeError};

/// Which WebAuthn ceremony a challenge drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CeremonyKind {
    #[serde(rename = "webauthn.create")]
    Create,
    #[serde(rename = "webauthn.get")]
    Get,
}

impl CeremonyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CeremonyKind::Create => "webauthn.create",
            CeremonyKind::Get => "webauthn.get",
        }
    }
}

impl fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CeremonyKind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webauthn.create" => Ok(CeremonyKind::Create),
            "webauthn.get" => Ok(CeremonyKind::Get),
            other => Err(DecodeError::UnknownCeremony(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CeremonyOptions {
    Create(CreationOptions),
    Get(RequestOptions),
}

impl CeremonyOptions {
    pub fn kind(&self) -> CeremonyKind {
        match self {
            CeremonyOptions::Create(_) => CeremonyKind::Create,
            CeremonyOptions::Get(_) => CeremonyKind::Get,
        }
    }

    pub fn user_verification(&self) -> Option<UserVerification> {
        match self {
            CeremonyOptions::Create(o) => o
                .authenticator_selection
                .as_ref()
                .and_then(|s| s.user_verification),
            CeremonyOptions::Get(o) => o.user_verification,
        }
    }
}

/// Relying-party application metadata shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub public_key: String,
}

/// Human-readable text plus opaque bytes the user is asked to sign.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignData {
    pub text: String,
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSignData {
    #[serde(default)]
    pub text: String,
    /// Standard padded base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl SignData {
    pub fn to_wire(&self) -> WireSignData {
        WireSignData {
            text: self.text.clone(),
            data: self.data.as_deref().map(encode_b64std),
        }
    }

    pub fn from_wire(wire: &WireSignData) -> Result<Self, DecodeError> {
        Ok(Self {
            text: wire.text.clone(),
            data: wire
                .data
                .as_deref()
                .map(|d| decode_b64std("signData.data", d))
                .transpose()?,
        })
    }
}

/// Body of `GET /api/v1/challenge/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChallenge {
    #[serde(rename = "type")]
    pub kind: String,
    pub public_key: Value,
    #[serde(default)]
    pub app: App,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_data: Option<WireSignData>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire: Option<i64>,
}

/// A pending WebAuthn ceremony.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub id: String,
    pub options: CeremonyOptions,
    pub app: App,
    pub sign_data: Option<SignData>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Challenge {
    pub fn from_wire(id: impl Into<String>, wire: &WireChallenge) -> Result<Self, DecodeError> {
        let options = match wire.kind.parse::<CeremonyKind>()? {
            CeremonyKind::Create => {
                let w: WireCreationOptions = serde_json::from_value(wire.public_key.clone())?;
                CeremonyOptions::Create(decode_creation_options(&w)?)
            }
            CeremonyKind::Get => {
                let w: WireRequestOptions = serde_json::from_value(wire.public_key.clone())?;
                CeremonyOptions::Get(decode_request_options(&w)?)
            }
        };

        Ok(Self {
            id: id.into(),
            options,
            app: wire.app.clone(),
            sign_data: wire.sign_data.as_ref().map(SignData::from_wire).transpose()?,
            expires_at: wire
                .expire
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        })
    }

    pub fn to_wire(&self) -> WireChallenge {
        let public_key = match &self.options {
            CeremonyOptions::Create(o) => serde_json::to_value(encode_creation_options(o)),
            CeremonyOptions::Get(o) => serde_json::to_value(encode_request_options(o)),
        }
        .unwrap_or(Value::Null);

        WireChallenge {
            kind: self.kind().as_str().to_string(),
            public_key,
            app: self.app.clone(),
            sign_data: self.sign_data.as_ref().map(SignData::to_wire),
            expire: self.expires_at.map(|t| t.timestamp()),
        }
    }

    pub fn kind(&self) -> CeremonyKind {
        self.options.kind()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

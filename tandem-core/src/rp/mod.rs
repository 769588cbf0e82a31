//! Relying-party API.
//!
//! The relying party issues challenges, verifies signatures and reports
//! outcomes. This crate only talks to it over HTTP; verification itself
//! happens on the relying party.
//!
//! ```no_run
//! use tandem_core::rp::{HttpRelyingParty, RelyingParty, SignRequest};
//!
//! # async fn example() -> tandem_core::Result<()> {
//! let rp = HttpRelyingParty::from_env()?;
//! let issued = rp.issue_challenge(&SignRequest::for_user("alice")).await?;
//! let challenge = rp.fetch_challenge(&issued.challenge_id).await?;
//! println!("{} wants a {}", challenge.app.name, challenge.kind());
//! # Ok(())
//! # }
//! ```

mod http;
mod mock;

pub use http::{HttpRelyingParty, RelyingPartyConfig};
pub use mock::MockRelyingParty;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::codec::{encode_b64std, Challenge, SignData, UserVerification, WireCredential};
use crate::collector::PollResult;
use crate::error::{Result, TandemError, TransportError};
use crate::secret::ChallengeSecret;

/// Anything that can report the state of a challenge.
#[async_trait]
pub trait OutcomeSource: Send + Sync {
    /// One poll. Relying-party level failures come back as
    /// [`PollResult::Error`]; `Err` is reserved for transport failures.
    async fn poll_outcome(&self, challenge_id: &str) -> std::result::Result<PollResult, TransportError>;
}

#[async_trait]
pub trait RelyingParty: OutcomeSource {
    async fn issue_challenge(&self, request: &SignRequest) -> Result<IssuedChallenge>;

    async fn fetch_challenge(&self, challenge_id: &str) -> Result<Challenge>;

    /// Posts the wire credential. The relying party answers with where the
    /// signing device should go next.
    async fn submit(&self, challenge_id: &str, credential: &WireCredential) -> Result<Redirect>;

    async fn reject(&self, challenge_id: &str) -> Result<Redirect>;
}

/// Request for a new signing challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Sent as standard base64.
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_data")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Where the signing device is sent after submitting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

fn serialize_data<S: serde::Serializer>(data: &Option<Vec<u8>>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match data {
        Some(bytes) => s.serialize_str(&encode_b64std(bytes)),
        None => s.serialize_none(),
    }
}

impl SignRequest {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn with_sign_data(mut self, data: SignData) -> Self {
        self.text = Some(data.text);
        self.data = data.data;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.data.is_some() && self.text.as_deref().unwrap_or_default().is_empty() {
            return Err(TandemError::InvalidRequest(
                "sign data requires a human-readable text".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuedChallenge {
    pub challenge_id: String,
    #[serde(alias = "qr_secret")]
    pub secret: ChallengeSecret,
}

/// Where the signing device goes after submit or reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Empty redirect: close the view.
    Close,
    Navigate(Url),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RedirectBody {
    #[serde(default)]
    pub redirect: String,
}

impl Redirect {
    pub fn parse(location: &str) -> std::result::Result<Self, TransportError> {
        if location.is_empty() {
            return Ok(Redirect::Close);
        }
        Url::parse(location)
            .map(Redirect::Navigate)
            .map_err(|e| TransportError::InvalidResponse(format!("bad redirect {location:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_request_requires_text_with_data() {
        let request = SignRequest {
            data: Some(vec![1]),
            ..SignRequest::for_user("u")
        };
        assert!(matches!(request.validate(), Err(TandemError::InvalidRequest(_))));

        let request = request.with_sign_data(SignData {
            text: "Pay".into(),
            data: Some(vec![1]),
        });
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_sign_request_json() {
        let request = SignRequest::for_user("u").with_sign_data(SignData {
            text: "Pay".into(),
            data: Some(b"hi".to_vec()),
        });
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "userId": "u", "text": "Pay", "data": "aGk=" })
        );
    }

    #[test]
    fn test_issued_challenge_accepts_qr_secret() {
        let issued: IssuedChallenge =
            serde_json::from_str(r#"{"challenge_id":"abc","qr_secret":"s"}"#).unwrap();
        assert_eq!(issued.challenge_id, "abc");
        assert_eq!(issued.secret.expose(), "s");
    }

    #[test]
    fn test_redirect_parse() {
        assert_eq!(Redirect::parse("").unwrap(), Redirect::Close);
        assert_eq!(
            Redirect::parse("https://app.example.com/done").unwrap(),
            Redirect::Navigate(Url::parse("https://app.example.com/done").unwrap())
        );
        assert!(Redirect::parse("not a url").is_err());
    }
}

//! Rotating QR token.
//!
//! The initiating device renders a QR code that changes every second. Each
//! frame carries a compact HS256 token over `{challenge_id, duration}`, keyed
//! with the challenge secret. The scanning device hands the token back to
//! the relying party, which checks it against the secret it issued.
//! The claims carry no registered timestamps; the verifier judges freshness
//! from `duration` and its own record of when the challenge was issued.

#[cfg(feature = "network")]
mod display;

#[cfg(feature = "network")]
pub use display::{DisplayHandle, TokenDisplay, DEFAULT_ROTATION_PERIOD};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::error::{Result, TandemError};
use crate::secret::ChallengeSecret;

/// Path on the relying-party origin that the scanning device opens.
pub const AUTHENTICATOR_PATH: &str = "authenticator";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub challenge_id: String,
    /// Whole seconds since the display started.
    #[serde(rename = "duration")]
    pub elapsed_seconds: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signature does not match secret")]
    BadSignature,

    #[error("unexpected signing algorithm")]
    Algorithm,
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => VerifyError::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => VerifyError::Algorithm,
            _ => VerifyError::Malformed(err.to_string()),
        }
    }
}

/// Issues the token for one display frame. Deterministic for a given
/// `(challenge_id, secret, elapsed_seconds)`.
pub fn issue(challenge_id: &str, secret: &ChallengeSecret, elapsed_seconds: u64) -> Result<String> {
    let claims = TokenClaims {
        challenge_id: challenge_id.to_string(),
        elapsed_seconds,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TandemError::Signing(e.to_string()))
}

/// Checks the signature and returns the claims. No registered claims are
/// required or validated.
pub fn verify(token: &str, secret: &ChallengeSecret) -> std::result::Result<TokenClaims, VerifyError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Builds `{base}/authenticator?token={token}`. Any path on `base` is kept.
pub fn qr_url(base: &Url, token: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{AUTHENTICATOR_PATH}", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut().append_pair("token", token);
    url
}

/// Extracts the token from a scanned URL.
pub fn token_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> ChallengeSecret {
        ChallengeSecret::new("correct horse battery staple")
    }

    #[test]
    fn test_issue_verify_recovers_claims() {
        let token = issue("c-42", &secret(), 7).unwrap();
        let claims = verify(&token, &secret()).unwrap();
        assert_eq!(claims.challenge_id, "c-42");
        assert_eq!(claims.elapsed_seconds, 7);
    }

    #[test]
    fn test_issue_is_deterministic() {
        assert_eq!(
            issue("c", &secret(), 3).unwrap(),
            issue("c", &secret(), 3).unwrap()
        );
        assert_ne!(
            issue("c", &secret(), 3).unwrap(),
            issue("c", &secret(), 4).unwrap()
        );
    }

    #[test]
    fn test_token_changes_with_challenge_and_secret() {
        let base = issue("c", &secret(), 3).unwrap();
        assert_ne!(issue("d", &secret(), 3).unwrap(), base);
        assert_ne!(issue("c", &ChallengeSecret::new("other secret"), 3).unwrap(), base);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue("c", &secret(), 0).unwrap();
        assert_eq!(
            verify(&token, &ChallengeSecret::new("other")).unwrap_err(),
            VerifyError::BadSignature
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = issue("c", &secret(), 0).unwrap();
        let forged = issue("d", &ChallengeSecret::new("other"), 0).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);
        assert_eq!(verify(&spliced, &secret()).unwrap_err(), VerifyError::BadSignature);
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            verify("not-a-token", &secret()),
            Err(VerifyError::Malformed(_))
        ));
    }

    #[test]
    fn test_payload_uses_duration_claim() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;

        let token = issue("abc", &secret(), 12).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "challenge_id": "abc", "duration": 12 }));
    }

    #[test]
    fn test_qr_url_keeps_base_path() {
        let base = Url::parse("https://rp.example.com/app/").unwrap();
        let url = qr_url(&base, "aaa.bbb.ccc");
        assert_eq!(
            url.as_str(),
            "https://rp.example.com/app/authenticator?token=aaa.bbb.ccc"
        );
        assert_eq!(token_from_url(&url).as_deref(), Some("aaa.bbb.ccc"));
    }

    #[test]
    fn test_qr_url_on_bare_origin() {
        let base = Url::parse("http://localhost:3000").unwrap();
        assert_eq!(
            qr_url(&base, "t").as_str(),
            "http://localhost:3000/authenticator?token=t"
        );
    }
}

//! In-memory relying party for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{IssuedChallenge, OutcomeSource, Redirect, RelyingParty, SignRequest};
use crate::codec::{Challenge, WireChallenge, WireCredential};
use crate::collector::PollResult;
use crate::error::{Result, TandemError, TransportError};
use crate::secret::ChallengeSecret;

/// Scripted relying party.
/// WARNING: Do not use in production - performs no verification!
///
/// Poll outcomes are served in order; once the script runs out every poll
/// reports `Pending`. Submissions and rejections are recorded for
/// inspection.
#[derive(Default)]
pub struct MockRelyingParty {
    challenges: Mutex<HashMap<String, WireChallenge>>,
    outcomes: Mutex<VecDeque<std::result::Result<PollResult, TransportError>>>,
    submissions: Mutex<Vec<(String, WireCredential)>>,
    rejections: Mutex<Vec<String>>,
    redirect: Mutex<Option<Redirect>>,
    issued: AtomicUsize,
    polls: AtomicUsize,
}

impl MockRelyingParty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_challenge(self, id: impl Into<String>, challenge: WireChallenge) -> Self {
        lock(&self.challenges).insert(id.into(), challenge);
        self
    }

    pub fn with_outcomes(
        self,
        outcomes: impl IntoIterator<Item = std::result::Result<PollResult, TransportError>>,
    ) -> Self {
        lock(&self.outcomes).extend(outcomes);
        self
    }

    pub fn with_redirect(self, redirect: Redirect) -> Self {
        *lock(&self.redirect) = Some(redirect);
        self
    }

    pub fn push_outcome(&self, outcome: PollResult) {
        lock(&self.outcomes).push_back(Ok(outcome));
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<(String, WireCredential)> {
        lock(&self.submissions).clone()
    }

    pub fn rejections(&self) -> Vec<String> {
        lock(&self.rejections).clone()
    }

    fn redirect(&self) -> Redirect {
        lock(&self.redirect).clone().unwrap_or(Redirect::Close)
    }

    fn not_found(challenge_id: &str) -> TandemError {
        TandemError::RelyingParty {
            status: 404,
            code: "not_found".to_string(),
            message: format!("challenge {challenge_id} not found"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl OutcomeSource for MockRelyingParty {
    async fn poll_outcome(&self, _challenge_id: &str) -> std::result::Result<PollResult, TransportError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        lock(&self.outcomes)
            .pop_front()
            .unwrap_or(Ok(PollResult::Pending))
    }
}

#[async_trait]
impl RelyingParty for MockRelyingParty {
    async fn issue_challenge(&self, request: &SignRequest) -> Result<IssuedChallenge> {
        request.validate()?;
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(IssuedChallenge {
            challenge_id: format!("mock-challenge-{n}"),
            secret: ChallengeSecret::new(format!("mock-secret-{n}")),
        })
    }

    async fn fetch_challenge(&self, challenge_id: &str) -> Result<Challenge> {
        let wire = lock(&self.challenges)
            .get(challenge_id)
            .cloned()
            .ok_or_else(|| Self::not_found(challenge_id))?;
        Ok(Challenge::from_wire(challenge_id, &wire)?)
    }

    async fn submit(&self, challenge_id: &str, credential: &WireCredential) -> Result<Redirect> {
        if !lock(&self.challenges).contains_key(challenge_id) {
            return Err(Self::not_found(challenge_id));
        }
        lock(&self.submissions).push((challenge_id.to_string(), credential.clone()));
        Ok(self.redirect())
    }

    async fn reject(&self, challenge_id: &str) -> Result<Redirect> {
        if !lock(&self.challenges).contains_key(challenge_id) {
            return Err(Self::not_found(challenge_id));
        }
        lock(&self.rejections).push(challenge_id.to_string());
        lock(&self.outcomes).push_back(Ok(PollResult::Rejected));
        Ok(self.redirect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CeremonyKind;
    use serde_json::json;

    fn get_challenge() -> WireChallenge {
        WireChallenge {
            kind: "webauthn.get".into(),
            public_key: json!({ "challenge": "AAEC" }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_known_challenge() {
        let rp = MockRelyingParty::new().with_challenge("c1", get_challenge());
        let challenge = rp.fetch_challenge("c1").await.unwrap();
        assert_eq!(challenge.kind(), CeremonyKind::Get);
        assert!(rp.fetch_challenge("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_issue_produces_distinct_ids() {
        let rp = MockRelyingParty::new();
        let a = rp.issue_challenge(&SignRequest::for_user("u")).await.unwrap();
        let b = rp.issue_challenge(&SignRequest::for_user("u")).await.unwrap();
        assert_ne!(a.challenge_id, b.challenge_id);
    }

    #[tokio::test]
    async fn test_reject_queues_rejected_outcome() {
        let rp = MockRelyingParty::new().with_challenge("c1", get_challenge());
        assert_eq!(rp.reject("c1").await.unwrap(), Redirect::Close);
        assert_eq!(rp.poll_outcome("c1").await.unwrap(), PollResult::Rejected);
        assert_eq!(rp.rejections(), vec!["c1".to_string()]);
    }
}

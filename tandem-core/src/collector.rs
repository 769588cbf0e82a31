//! Challenge outcome collector.
//!
//! Polls the relying party on a fixed interval until the challenge reaches a
//! terminal state. At most one poll request is in flight at a time, and a
//! cancelled collection issues no further requests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::rp::OutcomeSource;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(300);

/// Error code for a collection that ran out of time.
pub const CODE_TIMEOUT: &str = "timeout";
/// Error code for a poll the transport could not complete.
pub const CODE_TRANSPORT: &str = "transport_error";

/// Signed assertion handed back on a successful collect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAssertion {
    #[serde(default)]
    pub challenge_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub signed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_present: bool,
    #[serde(default)]
    pub user_verified: bool,
    /// Remaining members (public key, assertion response, sign data).
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    Pending,
    Viewed,
    Signed(Box<SignedAssertion>),
    Rejected,
    Error { code: String, message: String },
}

impl PollResult {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        PollResult::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollResult::Pending | PollResult::Viewed)
    }

    pub fn status(&self) -> &str {
        match self {
            PollResult::Pending => "pending",
            PollResult::Viewed => "viewed",
            PollResult::Signed(_) => "signed",
            PollResult::Rejected => "rejected",
            PollResult::Error { code, .. } => code,
        }
    }

    /// Interprets a collect response. Success bodies carry `status`; error
    /// bodies carry either `{status, msg}` or `{code, error, msg}`.
    pub fn from_response(http_status: u16, body: &[u8]) -> Self {
        let value: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                return PollResult::error(
                    CODE_TRANSPORT,
                    format!("unreadable collect response ({http_status}): {e}"),
                )
            }
        };

        let status = value.get("status").and_then(Value::as_str);
        let message = value
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if !(200..300).contains(&http_status) {
            let code = status
                .or_else(|| value.get("error").and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| format!("http_{http_status}"));
            return PollResult::Error { code, message };
        }

        match status {
            Some("pending") => PollResult::Pending,
            Some("viewed") => PollResult::Viewed,
            Some("rejected") => PollResult::Rejected,
            Some("signed") => match serde_json::from_value::<SignedAssertion>(value) {
                Ok(signed) => PollResult::Signed(Box::new(signed)),
                Err(e) => PollResult::error(CODE_TRANSPORT, format!("malformed signed response: {e}")),
            },
            Some(other) => PollResult::error(other, message),
            None => PollResult::error("invalid_status", "collect response carried no status"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub interval: Duration,
    /// `None` polls until a terminal state or cancellation.
    pub max_duration: Option<Duration>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: Some(DEFAULT_MAX_DURATION),
        }
    }
}

pub struct ChallengeCollector {
    source: Arc<dyn OutcomeSource>,
    config: CollectorConfig,
}

impl ChallengeCollector {
    pub fn new(source: Arc<dyn OutcomeSource>) -> Self {
        Self::with_config(source, CollectorConfig::default())
    }

    pub fn with_config(source: Arc<dyn OutcomeSource>, config: CollectorConfig) -> Self {
        Self { source, config }
    }

    /// Lazy outcome sequence. Nothing is requested until the first
    /// [`Collection::next`]; each call starts a fresh sequence.
    pub fn poll(&self, challenge_id: impl Into<String>) -> Collection {
        Collection {
            source: Arc::clone(&self.source),
            challenge_id: challenge_id.into(),
            config: self.config.clone(),
            ticker: None,
            deadline: None,
            finished: false,
        }
    }

    /// Runs a collection on its own task. Results arrive in order on the
    /// returned handle; dropping it cancels the polling.
    pub fn spawn(&self, challenge_id: impl Into<String>) -> CollectTask {
        let mut collection = self.poll(challenge_id);
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            while let Some(result) = collection.next().await {
                if tx.send(result).await.is_err() {
                    break;
                }
            }
        });
        CollectTask { rx, task }
    }

    /// Polls until a terminal result.
    pub async fn collect(&self, challenge_id: impl Into<String>) -> PollResult {
        let mut collection = self.poll(challenge_id);
        let mut last = PollResult::Pending;
        while let Some(result) = collection.next().await {
            last = result;
        }
        last
    }
}

pub struct Collection {
    source: Arc<dyn OutcomeSource>,
    challenge_id: String,
    config: CollectorConfig,
    ticker: Option<Interval>,
    deadline: Option<Instant>,
    finished: bool,
}

impl Collection {
    pub fn challenge_id(&self) -> &str {
        &self.challenge_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Waits one interval, polls once and returns the outcome. Returns
    /// `None` after a terminal outcome or cancellation.
    pub async fn next(&mut self) -> Option<PollResult> {
        if self.finished {
            return None;
        }

        let interval = self.config.interval;
        if self.ticker.is_none() {
            let start = Instant::now();
            let mut ticker = interval_at(start + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);
            self.deadline = self.config.max_duration.map(|d| start + d);
        }
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.tick().await;
        }

        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(self.timed_out());
        }

        // Retries inside the source count against the same deadline.
        let poll = self.source.poll_outcome(&self.challenge_id);
        let polled = match self.deadline {
            Some(deadline) => match timeout_at(deadline, poll).await {
                Ok(polled) => polled,
                Err(_) => return Some(self.timed_out()),
            },
            None => poll.await,
        };
        let result = match polled {
            Ok(result) => result,
            Err(e) => PollResult::error(CODE_TRANSPORT, e.to_string()),
        };

        if result.is_terminal() {
            self.finished = true;
            info!(challenge_id = %self.challenge_id, status = result.status(), "Collection finished");
        } else {
            debug!(challenge_id = %self.challenge_id, status = result.status(), "Challenge not yet complete");
        }
        Some(result)
    }

    pub fn cancel(&mut self) {
        self.finished = true;
        self.ticker = None;
    }

    fn timed_out(&mut self) -> PollResult {
        self.finished = true;
        warn!(challenge_id = %self.challenge_id, "Collection timed out");
        PollResult::error(CODE_TIMEOUT, "challenge was not completed in time")
    }
}

/// Background collection started by [`ChallengeCollector::spawn`].
pub struct CollectTask {
    rx: mpsc::Receiver<PollResult>,
    task: JoinHandle<()>,
}

impl CollectTask {
    pub async fn recv(&mut self) -> Option<PollResult> {
        self.rx.recv().await
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for CollectTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}

//! Timer-driven QR display.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use url::Url;

use super::{issue, qr_url};
use crate::error::Result;
use crate::secret::ChallengeSecret;

pub const DEFAULT_ROTATION_PERIOD: Duration = Duration::from_secs(1);

/// Produces the current QR URL for a challenge, refreshed once per period.
#[derive(Debug, Clone)]
pub struct TokenDisplay {
    challenge_id: String,
    secret: ChallengeSecret,
    base_url: Url,
    issued_at: Instant,
    period: Duration,
}

impl TokenDisplay {
    pub fn new(challenge_id: impl Into<String>, secret: ChallengeSecret, base_url: Url) -> Self {
        Self {
            challenge_id: challenge_id.into(),
            secret,
            base_url,
            issued_at: Instant::now(),
            period: DEFAULT_ROTATION_PERIOD,
        }
    }

    /// Backdates the display clock, e.g. when resuming a challenge.
    pub fn issued_at(mut self, issued_at: Instant) -> Self {
        self.issued_at = issued_at;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.issued_at.elapsed().as_secs()
    }

    pub fn current_url(&self) -> Result<Url> {
        let token = issue(&self.challenge_id, &self.secret, self.elapsed_seconds())?;
        Ok(qr_url(&self.base_url, &token))
    }

    /// Publishes the first URL immediately, then a fresh one every period
    /// until the handle is stopped or dropped.
    pub fn start(self) -> Result<DisplayHandle> {
        let first = self.current_url()?;
        let (tx, rx) = watch::channel(first);
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match self.current_url() {
                    Ok(url) => {
                        debug!(
                            challenge_id = %self.challenge_id,
                            elapsed = self.elapsed_seconds(),
                            "QR token rotated"
                        );
                        if tx.send(url).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, challenge_id = %self.challenge_id, "Failed to rotate QR token");
                        break;
                    }
                }
            }
        });

        Ok(DisplayHandle { rx, task })
    }
}

/// Running display. Stops rotating when dropped.
pub struct DisplayHandle {
    rx: watch::Receiver<Url>,
    task: JoinHandle<()>,
}

impl DisplayHandle {
    pub fn current(&self) -> Url {
        self.rx.borrow().clone()
    }

    /// Waits for the next rotation. Returns `None` once the display stopped.
    pub async fn changed(&mut self) -> Option<Url> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Url> {
        self.rx.clone()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

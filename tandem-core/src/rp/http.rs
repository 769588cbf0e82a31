//! HTTP client for the relying-party API.
//!
//! Idempotent reads (challenge fetch, collect) retry transient failures
//! with exponential backoff. Submit and reject are sent once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{IssuedChallenge, OutcomeSource, Redirect, RedirectBody, RelyingParty, SignRequest};
use crate::codec::{Challenge, WireChallenge, WireCredential};
use crate::collector::PollResult;
use crate::error::{Result, TandemError, TransportError};
use crate::secret::ClientSecret;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: u32 = 3;
const INITIAL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RelyingPartyConfig {
    pub base_url: Url,
    /// Client credentials for `/sign` and `/collect`.
    pub client_id: Option<String>,
    pub client_secret: Option<ClientSecret>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl RelyingPartyConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client_id: None,
            client_secret: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: MAX_RETRIES,
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
        }
    }

    pub fn with_client(mut self, id: impl Into<String>, secret: ClientSecret) -> Self {
        self.client_id = Some(id.into());
        self.client_secret = Some(secret);
        self
    }

    /// Reads `TANDEM_RP_URL`, `TANDEM_CLIENT_ID`, `TANDEM_CLIENT_SECRET`,
    /// `TANDEM_RP_TIMEOUT_SECS` and `TANDEM_RP_MAX_RETRIES`.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("TANDEM_RP_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&raw)
            .map_err(|e| TandemError::Config(format!("TANDEM_RP_URL {raw:?} is not a URL: {e}")))?;

        let mut config = Self::new(base_url);
        config.client_id = std::env::var("TANDEM_CLIENT_ID").ok();
        config.client_secret = std::env::var("TANDEM_CLIENT_SECRET").ok().map(ClientSecret::new);
        config.timeout = std::env::var("TANDEM_RP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        config.max_retries = std::env::var("TANDEM_RP_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(MAX_RETRIES);
        Ok(config)
    }
}

/// Error body of the relying-party API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    technical_msg: Option<String>,
}

pub struct HttpRelyingParty {
    client: Client,
    config: RelyingPartyConfig,
}

impl HttpRelyingParty {
    pub fn new(config: RelyingPartyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TandemError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(RelyingPartyConfig::from_env()?)
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| TandemError::Config(format!("bad endpoint {path}: {e}")))
    }

    fn with_client_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.client_id {
            Some(id) => builder.basic_auth(
                id,
                self.config.client_secret.as_ref().map(ClientSecret::expose),
            ),
            None => builder,
        }
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }

    /// Sends a request and returns the status and body. With `retry`, network
    /// errors and transient statuses are retried under the configured
    /// backoff.
    async fn execute<F>(&self, build: F, retry: bool) -> std::result::Result<(StatusCode, Vec<u8>), TransportError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        if !retry || self.config.max_retries == 0 {
            return send_once(build()).await.map_err(|e| match e {
                backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
            });
        }

        retry_notify(
            self.build_backoff(),
            || {
                let build = &build;
                async move { send_once(build()).await }
            },
            |err: TransportError, duration: Duration| {
                warn!(error = %err, retry_after_ms = duration.as_millis() as u64, "Retry scheduled");
            },
        )
        .await
    }

    fn expect_json<T: for<'de> Deserialize<'de>>(&self, status: StatusCode, body: &[u8]) -> Result<T> {
        if !status.is_success() {
            let err: ApiErrorBody = serde_json::from_slice(body).unwrap_or_default();
            if let Some(technical) = &err.technical_msg {
                debug!(technical = %technical, "Relying party error detail");
            }
            return Err(TandemError::RelyingParty {
                status: status.as_u16(),
                code: err.error,
                message: err.msg,
            });
        }
        serde_json::from_slice(body).map_err(|e| {
            TransportError::InvalidResponse(format!("unreadable relying party response: {e}")).into()
        })
    }
}

async fn send_once(
    builder: RequestBuilder,
) -> std::result::Result<(StatusCode, Vec<u8>), backoff::Error<TransportError>> {
    let start = Instant::now();

    let response = builder.send().await.map_err(|e| {
        let latency_ms = start.elapsed().as_millis() as u64;
        if is_transient_error(&e) {
            warn!(error = %e, latency_ms, "Transient error, will retry");
            backoff::Error::transient(TransportError::Http(e))
        } else {
            warn!(error = %e, latency_ms, "Permanent error, aborting");
            backoff::Error::permanent(TransportError::Http(e))
        }
    })?;

    let status = response.status();
    if is_transient_status(status) {
        warn!(status = %status, "Transient HTTP status, will retry");
        return Err(backoff::Error::transient(TransportError::Unavailable(format!(
            "relying party returned {status}"
        ))));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| backoff::Error::permanent(TransportError::Http(e)))?;

    debug!(
        status = %status,
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    Ok((status, body.to_vec()))
}

#[async_trait]
impl OutcomeSource for HttpRelyingParty {
    #[instrument(skip(self))]
    async fn poll_outcome(&self, challenge_id: &str) -> std::result::Result<PollResult, TransportError> {
        let url = self
            .config
            .base_url
            .join("api/v1/collect")
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        let body = serde_json::json!({ "challengeId": challenge_id });

        let (status, bytes) = self
            .execute(|| self.with_client_auth(self.client.post(url.clone()).json(&body)), true)
            .await?;
        Ok(PollResult::from_response(status.as_u16(), &bytes))
    }
}

#[async_trait]
impl RelyingParty for HttpRelyingParty {
    #[instrument(skip(self, request))]
    async fn issue_challenge(&self, request: &SignRequest) -> Result<IssuedChallenge> {
        request.validate()?;
        let url = self.endpoint("api/v1/sign")?;

        let (status, bytes) = self
            .execute(|| self.with_client_auth(self.client.post(url.clone()).json(request)), false)
            .await?;
        let issued: IssuedChallenge = self.expect_json(status, &bytes)?;
        info!(challenge_id = %issued.challenge_id, "Challenge issued");
        Ok(issued)
    }

    #[instrument(skip(self))]
    async fn fetch_challenge(&self, challenge_id: &str) -> Result<Challenge> {
        let url = self.endpoint(&format!("api/v1/challenge/{challenge_id}"))?;

        let (status, bytes) = self.execute(|| self.client.get(url.clone()), true).await?;
        let wire: WireChallenge = self.expect_json(status, &bytes)?;
        Ok(Challenge::from_wire(challenge_id, &wire)?)
    }

    #[instrument(skip(self, credential))]
    async fn submit(&self, challenge_id: &str, credential: &WireCredential) -> Result<Redirect> {
        let url = self.endpoint(&format!("api/v1/challenge/{challenge_id}"))?;

        let (status, bytes) = self
            .execute(|| self.client.post(url.clone()).json(credential), false)
            .await?;
        let body: RedirectBody = self.expect_json(status, &bytes)?;
        info!("Credential submitted");
        Ok(Redirect::parse(&body.redirect)?)
    }

    #[instrument(skip(self))]
    async fn reject(&self, challenge_id: &str) -> Result<Redirect> {
        let url = self.endpoint(&format!("api/v1/challenge/{challenge_id}"))?;

        let (status, bytes) = self.execute(|| self.client.delete(url.clone()), false).await?;
        let body: RedirectBody = self.expect_json(status, &bytes)?;
        info!("Challenge rejected");
        Ok(Redirect::parse(&body.redirect)?)
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

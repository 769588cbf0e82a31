//! Display command implementation.
//!
//! Runs the initiating device: issue a challenge, rotate its QR link, hold
//! the relay session, forward a relayed credential and collect the outcome.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use tandem_core::codec::{encode_credential, SignData, UserVerification};
use tandem_core::collector::CODE_TRANSPORT;
use tandem_core::{
    ChallengeCollector, CollectorConfig, HttpRelyingParty, PollResult, RelyingParty,
    SessionClient, SessionEffect, SignRequest, TokenDisplay,
};
use tracing::{debug, info, warn};
use url::Url;

use super::RpArgs;
use crate::utils;

pub struct DisplayOptions {
    pub user: String,
    pub text: Option<String>,
    pub data: Option<String>,
    pub require_uv: bool,
    pub redirect: Option<String>,
    pub relay: Option<Url>,
    pub timeout: Duration,
}

impl DisplayOptions {
    fn sign_request(&self) -> SignRequest {
        let mut request = SignRequest::for_user(self.user.as_str());
        if let Some(text) = &self.text {
            request = request.with_sign_data(SignData {
                text: text.clone(),
                data: self.data.as_ref().map(|d| d.as_bytes().to_vec()),
            });
        }
        if self.require_uv {
            request.user_verification = Some(UserVerification::Required);
        }
        request.redirect = self.redirect.clone();
        request.timeout = Some(self.timeout.as_secs());
        request
    }
}

/// Execute the display command.
pub async fn execute(rp_args: &RpArgs, options: DisplayOptions, json: bool, quiet: bool) -> Result<()> {
    let rp = Arc::new(rp_args.connect()?);

    let request = options.sign_request();
    request.validate()?;
    let issued = rp
        .issue_challenge(&request)
        .await
        .context("Failed to issue challenge")?;
    let challenge_id = issued.challenge_id.clone();
    info!(challenge_id = %challenge_id, "Challenge issued");

    let challenge = rp
        .fetch_challenge(&challenge_id)
        .await
        .context("Failed to fetch issued challenge")?;
    if !quiet {
        utils::print_challenge(&challenge);
        println!();
        println!("{}", "Scan the link below on the signing device:".bold());
    }

    let mut display = TokenDisplay::new(&challenge_id, issued.secret.clone(), rp.base_url().clone())
        .start()
        .context("Failed to start QR display")?;
    println!("{}", display.current());

    let relay_base = options.relay.clone().unwrap_or_else(|| rp.base_url().clone());
    let mut relay = match SessionClient::connect(&relay_base, &challenge_id, challenge.kind()).await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "Relay unavailable, waiting on the relying party only");
            None
        }
    };

    let collector = ChallengeCollector::with_config(
        rp.clone(),
        CollectorConfig {
            max_duration: Some(options.timeout),
            ..CollectorConfig::default()
        },
    );
    let mut outcomes = collector.spawn(challenge_id.as_str());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut scanned = false;
    let mut rotating = true;

    let outcome = loop {
        tokio::select! {
            url = display.changed(), if rotating => match url {
                Some(url) => {
                    if !quiet {
                        println!("{url}");
                    }
                }
                None => rotating = false,
            },
            result = outcomes.recv() => match result {
                Some(result) if result.is_terminal() => break result,
                Some(PollResult::Viewed) => announce_scan(&mut scanned, quiet),
                Some(result) => debug!(status = result.status(), "Waiting for signer"),
                None => break PollResult::error(CODE_TRANSPORT, "collector stopped"),
            },
            effect = next_effect(&mut relay) => match effect {
                Ok(SessionEffect::PeerJoined) => announce_scan(&mut scanned, quiet),
                Ok(SessionEffect::PeerLeft) => {
                    if !quiet {
                        println!("{}", "Signing device disconnected".yellow());
                    }
                }
                Ok(SessionEffect::CredentialReceived(credential)) => {
                    forward(&rp, &challenge_id, &credential).await?;
                    if !quiet {
                        println!("{}", "Signature received, waiting for confirmation".dimmed());
                    }
                }
                Ok(effect) => {
                    debug!(effect = ?effect, "Relay session ended");
                    relay = None;
                }
                Err(e) => {
                    warn!(error = %e, "Relay session failed");
                    relay = None;
                }
            },
            _ = &mut ctrl_c => {
                warn!(challenge_id = %challenge_id, "Interrupted");
                break PollResult::error("cancelled", "interrupted before the challenge was completed");
            }
        }
    };

    display.stop();
    outcomes.cancel();
    if let Some(client) = relay {
        if let Err(e) = client.close().await {
            debug!(error = %e, "Relay close failed");
        }
    }

    utils::report_outcome(outcome, json, quiet)
}

fn announce_scan(scanned: &mut bool, quiet: bool) {
    if !*scanned {
        *scanned = true;
        if !quiet {
            println!("{}", "QR code was scanned".green().bold());
        }
    }
}

async fn next_effect(relay: &mut Option<SessionClient>) -> tandem_core::Result<SessionEffect> {
    match relay {
        Some(client) => client.next_effect().await,
        None => std::future::pending().await,
    }
}

async fn forward(
    rp: &HttpRelyingParty,
    challenge_id: &str,
    credential: &tandem_core::Credential,
) -> Result<()> {
    let wire = encode_credential(credential);
    rp.submit(challenge_id, &wire)
        .await
        .context("Failed to forward relayed credential")?;
    info!(challenge_id = %challenge_id, "Relayed credential submitted");
    Ok(())
}

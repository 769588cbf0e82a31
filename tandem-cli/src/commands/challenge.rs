//! Signing-device side: inspect or decline a challenge.

use anyhow::{Context, Result};
use colored::Colorize;
use tandem_core::{Redirect, RelyingParty};
use tracing::info;

use super::RpArgs;
use crate::utils;

pub async fn show(rp: &RpArgs, challenge_id: &str, quiet: bool) -> Result<()> {
    let rp = rp.connect()?;
    let challenge = rp
        .fetch_challenge(challenge_id)
        .await
        .context("Failed to fetch challenge")?;
    info!(challenge_id = %challenge.id, kind = %challenge.kind(), "Fetched challenge");

    if !quiet {
        utils::print_challenge(&challenge);
    }
    Ok(())
}

pub async fn reject(rp: &RpArgs, challenge_id: &str, quiet: bool) -> Result<()> {
    let rp = rp.connect()?;
    let redirect = rp
        .reject(challenge_id)
        .await
        .context("Failed to reject challenge")?;
    info!(challenge_id = %challenge_id, "Challenge declined");

    if !quiet {
        println!("{} {}", "Declined".yellow().bold(), challenge_id);
        if let Redirect::Navigate(url) = redirect {
            println!("   {} {}", "Redirect:".dimmed(), url);
        }
    }
    Ok(())
}

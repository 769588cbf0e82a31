//! Collect command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use tandem_core::{ChallengeCollector, CollectorConfig, PollResult};

use super::RpArgs;
use crate::utils;

/// Execute the collect command.
pub async fn execute(
    rp: &RpArgs,
    challenge_id: String,
    interval: Duration,
    max_duration: Duration,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let rp = Arc::new(rp.connect()?);
    let collector = ChallengeCollector::with_config(
        rp,
        CollectorConfig {
            interval,
            max_duration: Some(max_duration),
        },
    );

    let mut collection = collector.poll(challenge_id.as_str());
    let mut last = PollResult::Pending;
    let mut shown = None;

    while let Some(result) = collection.next().await {
        if !quiet && !result.is_terminal() && shown.as_deref() != Some(result.status()) {
            println!("   {} {}", "Status:".dimmed(), result.status());
            shown = Some(result.status().to_string());
        }
        last = result;
    }

    utils::report_outcome(last, json, quiet)
}

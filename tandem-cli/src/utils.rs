//! Common utility functions shared across CLI commands.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use tandem_core::collector::{CODE_TIMEOUT, CODE_TRANSPORT};
use tandem_core::{Challenge, PollResult, SignedAssertion};
use tracing_subscriber::EnvFilter;

/// Log to stderr. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tandem={level},tandem_core={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print the final outcome of a collection and turn failures into errors.
pub fn report_outcome(result: PollResult, json: bool, quiet: bool) -> Result<()> {
    match result {
        PollResult::Signed(signed) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&signed)?);
            } else if !quiet {
                print_signed(&signed);
            }
            Ok(())
        }
        PollResult::Rejected => {
            if !quiet {
                println!();
                println!("{}", "   REJECTED".red().bold());
            }
            bail!("Challenge rejected by the signer")
        }
        PollResult::Error { code, message } if code == CODE_TIMEOUT => {
            bail!("Challenge timed out: {message}")
        }
        PollResult::Error { code, message } if code == CODE_TRANSPORT => {
            bail!("Relying party unavailable: {message}")
        }
        PollResult::Error { code, message } => bail!("Collect failed ({code}): {message}"),
        PollResult::Pending | PollResult::Viewed => {
            bail!("Collection ended before the challenge was completed")
        }
    }
}

fn print_signed(signed: &SignedAssertion) {
    println!();
    println!("{}", "╔════════════════════════════════════════╗".green());
    println!("{}", "║                SIGNED                  ║".green().bold());
    println!("{}", "╚════════════════════════════════════════╝".green());
    println!();
    println!("   {} {}", "Challenge:".dimmed(), signed.challenge_id);
    println!("   {} {}", "User:".dimmed(), signed.user_id);
    if let Some(at) = signed.signed {
        println!("   {} {}", "Signed at:".dimmed(), format_time(at));
    }
    println!("   {} {}", "User present:".dimmed(), yes_no(signed.user_present));
    println!("   {} {}", "User verified:".dimmed(), yes_no(signed.user_verified));
}

/// Print a fetched challenge the way a signing page would summarise it.
pub fn print_challenge(challenge: &Challenge) {
    println!("{} {}", "Challenge".bold(), challenge.id);
    println!("   {} {}", "Ceremony:".dimmed(), challenge.kind());
    if !challenge.app.name.is_empty() {
        println!("   {} {}", "App:".dimmed(), challenge.app.name);
    }
    if let Some(uv) = challenge.options.user_verification() {
        println!("   {} {:?}", "User verification:".dimmed(), uv);
    }
    if let Some(sign_data) = &challenge.sign_data {
        println!("   {} {}", "Text:".dimmed(), sign_data.text);
        if let Some(data) = &sign_data.data {
            println!("   {} {} bytes", "Data:".dimmed(), data.len());
        }
    }
    if let Some(at) = challenge.expires_at {
        let expired = if challenge.is_expired(Utc::now()) {
            " (expired)".red().to_string()
        } else {
            String::new()
        };
        println!("   {} {}{}", "Expires:".dimmed(), format_time(at), expired);
    }
}

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn yes_no(flag: bool) -> colored::ColoredString {
    if flag {
        "yes".green()
    } else {
        "no".yellow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_time() {
        // 2024-01-15 12:30:45 UTC
        let at = Utc.timestamp_opt(1705321845, 0).unwrap();
        assert_eq!(format_time(at), "2024-01-15 12:30:45 UTC");
    }

    #[test]
    fn test_rejected_outcome_is_error() {
        let err = report_outcome(PollResult::Rejected, false, true).unwrap_err();
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn test_timeout_and_transport_messages() {
        let timeout = report_outcome(PollResult::error(CODE_TIMEOUT, "late"), false, true).unwrap_err();
        assert!(timeout.to_string().contains("timed out"));

        let transport =
            report_outcome(PollResult::error(CODE_TRANSPORT, "refused"), false, true).unwrap_err();
        assert!(transport.to_string().contains("unavailable"));
    }

    #[test]
    fn test_other_error_keeps_code() {
        let err = report_outcome(PollResult::error("expired", "too late"), false, true).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }
}

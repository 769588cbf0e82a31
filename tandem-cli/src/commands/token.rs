//! Offline token helpers.

use anyhow::{Context, Result};
use colored::Colorize;
use tandem_core::token::{self, token_from_url};
use tandem_core::{ChallengeSecret, TandemError};
use tracing::debug;
use url::Url;

/// Print the token (or QR link) a display shows `elapsed` seconds in.
pub fn issue(challenge_id: &str, secret: &str, elapsed: u64, base: Option<&Url>) -> Result<()> {
    let secret = ChallengeSecret::new(secret);
    let signed = token::issue(challenge_id, &secret, elapsed).context("Failed to sign token")?;

    match base {
        Some(base) => println!("{}", token::qr_url(base, &signed)),
        None => println!("{signed}"),
    }
    Ok(())
}

/// Verify a token, or the token inside a scanned link.
pub fn verify(input: &str, secret: &str, json: bool, quiet: bool) -> Result<()> {
    let signed = extract_token(input);
    let secret = ChallengeSecret::new(secret);

    let claims = token::verify(&signed, &secret)
        .map_err(TandemError::from)
        .context("Token verification failed")?;
    debug!(challenge_id = %claims.challenge_id, "Token verified");

    if json {
        println!("{}", serde_json::to_string_pretty(&claims)?);
    } else if !quiet {
        println!("{} {}", "Valid token".green().bold(), "(HS256)".dimmed());
        println!("   {} {}", "Challenge:".dimmed(), claims.challenge_id);
        println!("   {} {}s", "Elapsed:".dimmed(), claims.elapsed_seconds);
    }
    Ok(())
}

fn extract_token(input: &str) -> String {
    Url::parse(input)
        .ok()
        .and_then(|url| token_from_url(&url))
        .unwrap_or_else(|| input.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_from_link() {
        assert_eq!(
            extract_token("https://rp.example.com/authenticator?token=abc.def.ghi"),
            "abc.def.ghi"
        );
    }

    #[test]
    fn test_extract_bare_token() {
        assert_eq!(extract_token(" abc.def.ghi\n"), "abc.def.ghi");
    }
}

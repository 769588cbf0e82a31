//! Tandem CLI - Cross-device WebAuthn remote signing from the terminal.

use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use url::Url;

mod commands;
mod exit_codes;
mod utils;

use commands::RpArgs;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (bad arguments or request)
  65  Challenge rejected or token verification failed
  69  Relying party or relay unavailable
  75  Challenge not completed in time";

#[derive(Parser)]
#[command(name = "tandem")]
#[command(author, version, about = "Cross-device WebAuthn remote signing", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Only print machine-readable results
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a challenge, show its rotating QR link and wait for the signature
    Display {
        #[command(flatten)]
        rp: RpArgs,

        /// User the challenge is issued for
        #[arg(long)]
        user: String,

        /// Human-readable text shown to the signer
        #[arg(long)]
        text: Option<String>,

        /// Payload bound to the signature (requires --text)
        #[arg(long, requires = "text")]
        data: Option<String>,

        /// Require user verification (PIN or biometrics)
        #[arg(long)]
        require_uv: bool,

        /// Where the signing device goes after responding
        #[arg(long, value_name = "URL")]
        redirect: Option<String>,

        /// Relay base URL (defaults to the relying party URL)
        #[arg(long, value_name = "URL")]
        relay: Option<Url>,

        /// Seconds to wait for the signature
        #[arg(long, default_value_t = 300)]
        timeout: u64,

        /// Print the signed assertion as JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll a challenge until it is signed, rejected or expires
    Collect {
        #[command(flatten)]
        rp: RpArgs,

        /// Challenge to collect
        #[arg(value_name = "CHALLENGE_ID")]
        challenge_id: String,

        /// Delay between polls in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 300)]
        max_secs: u64,

        /// Print the signed assertion as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or decline a challenge as the signing device
    Challenge {
        #[command(subcommand)]
        action: ChallengeAction,
    },

    /// Issue or verify rotating QR tokens offline
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum ChallengeAction {
    /// Fetch and decode a challenge
    Show {
        #[command(flatten)]
        rp: RpArgs,

        #[arg(value_name = "CHALLENGE_ID")]
        challenge_id: String,
    },

    /// Decline a challenge
    Reject {
        #[command(flatten)]
        rp: RpArgs,

        #[arg(value_name = "CHALLENGE_ID")]
        challenge_id: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Sign the token shown after ELAPSED seconds
    Issue {
        #[arg(value_name = "CHALLENGE_ID")]
        challenge_id: String,

        #[arg(value_name = "SECRET")]
        secret: String,

        #[arg(value_name = "ELAPSED")]
        elapsed: u64,

        /// Print the full QR link under this base URL instead of the bare token
        #[arg(long, value_name = "URL")]
        base: Option<Url>,
    },

    /// Verify a token or QR link against the challenge secret
    Verify {
        /// Bare token or a link carrying `?token=`
        #[arg(value_name = "TOKEN")]
        token: String,

        #[arg(value_name = "SECRET")]
        secret: String,

        /// Print the claims as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(exit_codes::USAGE_ERROR);
        }
        Err(e) => e.exit(),
    };

    utils::init_tracing(cli.verbose);
    let quiet = cli.quiet;

    let result = match cli.command {
        Commands::Display {
            rp,
            user,
            text,
            data,
            require_uv,
            redirect,
            relay,
            timeout,
            json,
        } => {
            let options = commands::display::DisplayOptions {
                user,
                text,
                data,
                require_uv,
                redirect,
                relay,
                timeout: Duration::from_secs(timeout),
            };
            commands::display::execute(&rp, options, json, quiet).await
        }
        Commands::Collect {
            rp,
            challenge_id,
            interval_ms,
            max_secs,
            json,
        } => {
            commands::collect::execute(
                &rp,
                challenge_id,
                Duration::from_millis(interval_ms),
                Duration::from_secs(max_secs),
                json,
                quiet,
            )
            .await
        }
        Commands::Challenge { action } => match action {
            ChallengeAction::Show { rp, challenge_id } => {
                commands::challenge::show(&rp, &challenge_id, quiet).await
            }
            ChallengeAction::Reject { rp, challenge_id } => {
                commands::challenge::reject(&rp, &challenge_id, quiet).await
            }
        },
        Commands::Token { action } => match action {
            TokenAction::Issue {
                challenge_id,
                secret,
                elapsed,
                base,
            } => commands::token::issue(&challenge_id, &secret, elapsed, base.as_ref()),
            TokenAction::Verify {
                token,
                secret,
                json,
            } => commands::token::verify(&token, &secret, json, quiet),
        },
    };

    if let Err(err) = result {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}

//! Subcommand implementations.

pub mod challenge;
pub mod collect;
pub mod display;
pub mod token;

use anyhow::{Context, Result};
use clap::Args;
use tandem_core::rp::RelyingPartyConfig;
use tandem_core::{ClientSecret, HttpRelyingParty};
use url::Url;

/// Relying-party connection flags. Unset flags fall back to `TANDEM_RP_URL`,
/// `TANDEM_CLIENT_ID` and `TANDEM_CLIENT_SECRET`.
#[derive(Args, Debug, Clone, Default)]
pub struct RpArgs {
    /// Relying party base URL
    #[arg(long, value_name = "URL")]
    pub rp: Option<Url>,

    /// Client id for the relying-party API
    #[arg(long)]
    pub client_id: Option<String>,

    /// Client secret for the relying-party API
    #[arg(long)]
    pub client_secret: Option<String>,
}

impl RpArgs {
    pub fn config(&self) -> Result<RelyingPartyConfig> {
        let mut config = RelyingPartyConfig::from_env().context("Invalid relying party configuration")?;
        if let Some(url) = &self.rp {
            config.base_url = url.clone();
        }
        if let Some(id) = &self.client_id {
            config.client_id = Some(id.clone());
        }
        if let Some(secret) = &self.client_secret {
            config.client_secret = Some(ClientSecret::new(secret.as_str()));
        }
        Ok(config)
    }

    pub fn connect(&self) -> Result<HttpRelyingParty> {
        HttpRelyingParty::new(self.config()?).context("Failed to create relying party client")
    }
}

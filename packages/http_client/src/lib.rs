#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP client construction for the external collaborators.
//!
//! Every component that talks to the network (geocoder, geodata provider,
//! LLM providers) receives a [`reqwest::Client`] built here from an
//! explicit [`HttpClientConfig`]. Nothing in the workspace changes TLS or
//! proxy behaviour globally.

use std::time::Duration;

use serde::Deserialize;

/// Transport settings shared by all outbound HTTP calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
    /// `User-Agent` header. Nominatim rejects requests without one.
    pub user_agent: String,
    /// Skip TLS certificate verification (for intercepting corporate
    /// proxies). Off unless explicitly configured.
    pub accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 10,
            user_agent: concat!("locality-lens/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_invalid_certs: false,
        }
    }
}

impl HttpClientConfig {
    /// Builds a client with these settings.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the TLS backend cannot be initialized.
    pub fn build(&self) -> Result<reqwest::Client, reqwest::Error> {
        if self.accept_invalid_certs {
            log::warn!("TLS certificate verification is disabled for outbound requests");
        }

        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
    }
}

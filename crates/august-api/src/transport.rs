// Shared transport configuration for building reqwest::Client instances.
//
// The August cloud expects a vendor API key and JSON content negotiation
// on every request; both are injected here as default headers so the
// endpoint methods never repeat them.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::Error;

/// Vendor API key sent with every request. Shared by all official and
/// third-party August clients; not a per-account secret.
pub const AUGUST_API_KEY: &str = "79fd0eb6-381d-4adf-95a0-47721289d19d";

/// API contract version the client speaks.
const ACCEPT_VERSION: &str = "0.0.1";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub api_key: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            api_key: AUGUST_API_KEY.to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// The returned client carries the August default headers
    /// (`x-august-api-key`, `Accept-Version`) on every request.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-august-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|e| Error::Api {
                status: 0,
                message: format!("invalid API key header: {e}"),
            })?,
        );
        headers.insert("Accept-Version", HeaderValue::from_static(ACCEPT_VERSION));

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent("august-rs/0.1.0")
            .default_headers(headers)
            .build()
            .map_err(Error::Transport)
    }
}

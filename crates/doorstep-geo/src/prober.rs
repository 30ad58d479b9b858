use std::time::Duration;

use doorstep_common::{Error, GeolocationResult, Result};
use tracing::{debug, warn};

use crate::provider::{GeoProvider, normalize_body};
use crate::race::first_success;

/// Resolves a visitor's approximate public network identity by racing the
/// configured lookup services in priority order.
pub struct GeolocationProber {
    client: reqwest::Client,
    providers: Vec<GeoProvider>,
    attempt_timeout: Duration,
}

impl GeolocationProber {
    pub fn new(providers: Vec<GeoProvider>, attempt_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            providers,
            attempt_timeout,
        }
    }

    /// Race the provider chain and return the first usable result.
    ///
    /// Never fails: provider errors (network, timeout, bad status, malformed
    /// body) mean "try the next one", and full exhaustion yields the
    /// unavailable sentinel instead of an error.
    pub async fn resolve(&self) -> GeolocationResult {
        match first_success(&self.providers, |provider| self.probe(provider)).await {
            Some(result) => result,
            None => {
                warn!("all geolocation providers failed, continuing without network identity");
                GeolocationResult::unavailable()
            }
        }
    }

    async fn probe(&self, provider: &GeoProvider) -> Result<GeolocationResult> {
        let response = self
            .client
            .get(&provider.url)
            .timeout(self.attempt_timeout)
            .send()
            .await
            .map_err(|e| Error::Geolocation(format!("{}: {e}", provider.name)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Geolocation(format!(
                "{}: HTTP {status}",
                provider.name
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Geolocation(format!("{}: invalid body: {e}", provider.name)))?;

        debug!("geolocation resolved via {}", provider.name);
        Ok(normalize_body(&body))
    }
}

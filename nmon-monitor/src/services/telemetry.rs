//! Telemetry endpoint client
//!
//! Reports one scalar per run. Delivery is best-effort: transport errors and
//! non-2xx responses are logged and never reach the run.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the feed API key
pub const API_KEY_HEADER: &str = "X-AIO-Key";

/// Sink for the per-run metric
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Returns true when the endpoint accepted the value
    async fn report(&self, value: f64) -> bool;
}

#[derive(Debug, Serialize)]
struct DataPoint {
    value: f64,
}

/// HTTP POST client for a single feed
pub struct HttpTelemetry {
    http_client: Client,
    url: String,
    api_key: String,
}

impl HttpTelemetry {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl TelemetryClient for HttpTelemetry {
    async fn report(&self, value: f64) -> bool {
        debug!(url = %self.url, value, "Sending telemetry");

        let response = self
            .http_client
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&DataPoint { value })
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(value, status = %resp.status(), "Telemetry sent");
                true
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(value, %status, body = %body, "Telemetry endpoint rejected value");
                false
            }
            Err(e) => {
                warn!(value, error = %e, "Telemetry request failed");
                false
            }
        }
    }
}

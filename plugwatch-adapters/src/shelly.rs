//! Shelly plug client using the device's HTTP status endpoint.
//!
//! The client issues one `GET {scheme}://{address}/status` per call, with
//! basic auth when the device has a username configured, and decodes the
//! JSON body into a [`DeviceStatus`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use plugwatch_adapters::{ShellyClient, StatusSource};
//! use plugwatch_types::DeviceConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ShellyClient::builder()
//!         .user_agent("plugwatch")
//!         .build()?;
//!
//!     let device = DeviceConfig::new("desk", "192.168.1.20")
//!         .with_credentials("admin", "secret")
//!         .with_timeout(Duration::from_secs(3));
//!
//!     let status = client.fetch_status(&device, None).await?;
//!     println!("{} meters, {}°C", status.meters.len(), status.temperature);
//!     Ok(())
//! }
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use plugwatch_types::{DeviceConfig, DeviceStatus};

use crate::source::effective_timeout;
use crate::{FetchError, StatusSource};

/// HTTP client for Shelly plug status endpoints.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ShellyClient {
    client: Client,
}

impl ShellyClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> ShellyClientBuilder {
        ShellyClientBuilder::default()
    }

    async fn request(
        &self,
        device: &DeviceConfig,
        budget: Duration,
    ) -> Result<DeviceStatus, FetchError> {
        let mut request = self.client.get(device.status_url()).timeout(budget);
        if let Some(creds) = &device.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!(
                "device returned status {}",
                status
            )));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl StatusSource for ShellyClient {
    async fn fetch_status(
        &self,
        device: &DeviceConfig,
        deadline: Option<Instant>,
    ) -> Result<DeviceStatus, FetchError> {
        let budget = effective_timeout(device.timeout, deadline);
        if budget.is_zero() {
            return Err(FetchError::Timeout);
        }

        // The outer timeout also covers body streaming and decoding.
        match tokio::time::timeout(budget, self.request(device, budget)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }
}

/// Builder for ShellyClient.
#[derive(Debug, Default)]
pub struct ShellyClientBuilder {
    user_agent: Option<String>,
    accept_invalid_certs: bool,
    connect_timeout: Option<Duration>,
}

impl ShellyClientBuilder {
    /// Set the `User-Agent` header (default: `plugwatch/<version>`).
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Accept self-signed device certificates on `https` devices.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Bound the TCP/TLS connect phase separately from the request timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ShellyClient, FetchError> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| concat!("plugwatch/", env!("CARGO_PKG_VERSION")).to_string());

        let mut builder = Client::builder()
            .user_agent(user_agent)
            .danger_accept_invalid_certs(self.accept_invalid_certs);
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder.build()?;
        Ok(ShellyClient { client })
    }
}

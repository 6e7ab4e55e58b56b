//! # plugwatch-adapters
//!
//! Device-facing half of plugwatch: fetching a device's status payload and
//! turning it into normalized [`Observation`]s.
//!
//! ## Supported Devices
//!
//! - **Shelly plugs** (`shelly` feature, default) - polls the `/status`
//!   endpoint over HTTP(S) with optional basic auth
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plugwatch_adapters::{normalize, ShellyClient, StatusSource};
//! use plugwatch_types::DeviceConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ShellyClient::builder().build()?;
//!     let device = DeviceConfig::new("kitchen", "10.0.0.5");
//!
//!     let status = client.fetch_status(&device, None).await?;
//!     for obs in normalize(&device.name, &status) {
//!         println!("{} {:?} = {}", obs.name, obs.attributes, obs.value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod normalize;
pub mod source;

#[cfg(feature = "shelly")]
pub mod shelly;

pub use error::FetchError;
pub use normalize::normalize;
pub use source::{effective_timeout, StatusSource};

#[cfg(feature = "shelly")]
pub use shelly::{ShellyClient, ShellyClientBuilder};

// Re-export types for convenience
pub use plugwatch_types::{DeviceConfig, DeviceStatus, MeterReading, Observation};

//! # plugwatch-sdk
//!
//! Metric-side half of plugwatch. Observations produced by the collection
//! engine land in a sink, and the [`Registry`] turns them into metric
//! families that can be scraped.
//!
//! Two sink shapes are supported:
//!
//! - **Push** ([`PushSink`]): `set_gauge` / `add_counter` are called eagerly
//!   whenever a device is polled; values persist until overwritten.
//! - **Pull** ([`Observer`]): `observe` is called only inside a registry
//!   collection callback ([`Collect`]); values live for one scrape.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plugwatch_sdk::prometheus::{PrometheusConfig, PrometheusExporter};
//! use plugwatch_sdk::{PushSink, Registry};
//! use plugwatch_types::{Attributes, PLUG_POWER};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(Registry::new());
//!     registry.set_gauge(PLUG_POWER, &Attributes::device("desk").with("meter", 0), 12.5);
//!
//!     let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//!     let server = PrometheusExporter::new(PrometheusConfig::default(), registry)
//!         .bind()
//!         .await?;
//!     server.run(stop_rx).await;
//!     Ok(())
//! }
//! ```

mod registry;
mod sink;

#[cfg(feature = "otel")]
pub mod otel;

#[cfg(feature = "prometheus")]
pub mod prometheus;

pub use registry::{Collect, CollectError, Gathered, MetricFamily, Registry, Sample};
pub use sink::{Fanout, Observer, PushSink};

#[cfg(feature = "otel")]
pub use otel::{OtelConfig, OtelSink};

// Re-export types for convenience
pub use plugwatch_types::{Attributes, MetricDesc, Observation, ValueKind};

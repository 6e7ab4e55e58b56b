//! # plugwatch
//!
//! A Prometheus exporter for a fleet of smart plugs.
//!
//! Each plug exposes a JSON status document over HTTP. plugwatch polls every
//! configured plug, normalizes its status into `plug_*` observations, and
//! serves them on a scrape endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          plugwatch                           │
//! │  ┌─────────┐    ┌─────────────┐    ┌────────────┐            │
//! │  │ config  │───▶│  collector  │───▶│  Registry  │──▶ /metrics│
//! │  │ (YAML)  │    │ push | pull │    │ (+ OTLP)   │            │
//! │  └─────────┘    └──────┬──────┘    └────────────┘            │
//! │                        │ StatusSource                        │
//! │                        ▼                                     │
//! │                 ┌─────────────┐                              │
//! │                 │ ShellyClient│◀── GET {scheme}://{addr}/status
//! │                 └─────────────┘                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`config`]**: YAML + environment configuration and per-device defaults
//! - **[`collector`]**: per-device schedulers (push) and concurrent scrape
//!   rounds (pull)
//! - **[`logging`]**: `tracing` subscriber setup
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! plugwatch --config plugwatch.yml
//! plugwatch --config plugwatch.yml --mode pull --log text
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use plugwatch::collector::Collector;
//! use plugwatch::config::Config;
//! use plugwatch_adapters::ShellyClient;
//! use plugwatch_sdk::Registry;
//!
//! # tokio_test::block_on(async {
//! let config = Config::from_yaml("configs:\n  - { name: desk, address: 10.0.0.5 }\n").unwrap();
//! let client = Arc::new(ShellyClient::builder().build().unwrap());
//! let collector = Arc::new(Collector::new(config.resolve_devices().unwrap(), client));
//!
//! let registry = Registry::new();
//! registry.register_collector(collector);
//! let gathered = registry.gather(None).await;
//! println!("{} samples", gathered.sample_count());
//! # });
//! ```

pub mod collector;
pub mod config;
pub mod logging;

pub use collector::{Collector, RoundError, Scheduler, SchedulerHandle, SchedulerState};
pub use config::{Config, ConfigError, Mode};

//! # plugwatch-types
//!
//! Core types shared by every plugwatch crate. The device side of the
//! pipeline produces a [`DeviceStatus`], the normalizer turns it into a list
//! of [`Observation`]s, and metric sinks consume those observations without
//! knowing anything about the device payload.
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: Decode device status payloads and serialize observations
//!
//! ## Example
//!
//! ```rust
//! use plugwatch_types::{Attributes, Observation, ValueKind, PLUG_POWER};
//!
//! let obs = Observation::gauge(
//!     PLUG_POWER,
//!     Attributes::device("plug1").with("meter", "0"),
//!     42.5,
//! );
//!
//! assert_eq!(obs.kind, ValueKind::Gauge);
//! assert_eq!(obs.attributes.get("name"), Some("plug1"));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod device;
mod metric;
mod observation;
mod status;

pub use device::*;
pub use metric::*;
pub use observation::*;
pub use status::*;

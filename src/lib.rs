//! airbeacon library: layout-driven BLE beacon codec with region and
//! presence tracking.
//!
//! A beacon format is described by a short layout string such as
//! `m:2-3=beac,i:4-19,i:20-21,i:22-23,p:24-24,d:25-25`. The library compiles
//! layouts, decodes advertisement bytes into [`BeaconRecord`]s, encodes records
//! back into transmittable payloads, and tracks which regions and beacons are
//! currently present. Radio access is left to the caller: platform binaries
//! feed raw advertisements in and forward the NDJSON messages out.
//!
//! The library is organized in two code layers:
//! - **Layer 1**: `identifier`, `layout`, `codec`, `beacon`, `region`,
//!   `scanner`, `filter`, `defaults`, `protocol`, `comm`, `error`. `no_std`
//!   with `alloc`.
//! - **Layer 2** (feature `std`, on by default): `clock`, `rssi`, `tracker`,
//!   `monitor`. Needs `std::sync::Mutex` and `std::time::Instant`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod beacon;
pub mod codec;
pub mod comm;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod identifier;
pub mod layout;
pub mod protocol;
pub mod region;
pub mod scanner;

#[cfg(feature = "std")]
pub mod clock;
#[cfg(feature = "std")]
pub mod monitor;
#[cfg(feature = "std")]
pub mod rssi;
#[cfg(feature = "std")]
pub mod tracker;

pub use beacon::{BeaconRecord, DistanceCalculator};
pub use codec::{advertisement, decode, encode, Advertisement};
pub use identifier::Identifier;
pub use layout::{compile, LayoutDescriptor};
pub use region::Region;

#[cfg(feature = "std")]
pub use monitor::{BeaconMonitor, MonitorReport};
#[cfg(feature = "std")]
pub use tracker::{Tracker, TrackingMode};

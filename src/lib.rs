// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # ibbq-rust-ble
//!
//! A Rust library for reading iBBQ Bluetooth Low Energy barbecue
//! thermometers (Inkbird IBT-2X, IBT-4XS, IBT-6X and rebrands).
//!
//! An [`Ibbq`] session finds the first thermometer advertising as `iBBQ`,
//! logs in, configures units, subscribes to real-time and battery
//! notifications, and then delivers decoded readings to a
//! [`SessionObserver`] until the connection ends.
//!
//! ## Features
//!
//! - **Real-time Temperatures**: One value per probe, 0.1°C resolution
//! - **Battery Monitoring**: Periodic battery requests with percentage
//! - **Status Tracking**: Disconnected, Connecting and Connected events
//! - **Cancellation**: Tie a session to a [`tokio_util::sync::CancellationToken`]
//! - **Testing**: An in-memory transport in [`mock`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ibbq_rust_ble::{Callbacks, Configuration, Ibbq, Result, TemperatureUnit};
//! use tokio::sync::Notify;
//! use tokio_util::sync::CancellationToken;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let disconnected = Arc::new(Notify::new());
//!     let done = disconnected.clone();
//!
//!     let callbacks = Callbacks::new()
//!         .with_temperature(|reading| {
//!             for (i, t) in reading.probes.iter().enumerate() {
//!                 println!("probe {}: {:.1}°C", i + 1, t);
//!             }
//!         })
//!         .with_battery(|battery| println!("battery: {}%", battery.percent))
//!         .with_disconnected(move || done.notify_one());
//!
//!     let config = Configuration::default().with_temperature_unit(TemperatureUnit::Celsius);
//!     let ibbq = Ibbq::with_default_adapter(config, callbacks, CancellationToken::new()).await?;
//!     ibbq.connect().await?;
//!
//!     disconnected.notified().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for readings and configuration

// Public modules
pub mod ble;
pub mod config;
pub mod data;
pub mod error;
pub mod ibbq;
pub mod mock;
pub mod observer;
pub mod poller;
pub mod protocol;
pub mod status;
pub mod utils;

// Re-exports for convenience
pub use config::{Configuration, TemperatureUnit};
pub use error::{Error, Result};
pub use ibbq::{Ibbq, IbbqBuilder};
pub use observer::{Callbacks, NoopObserver, SessionObserver};
pub use status::{SessionState, Status};
pub use utils::{celsius_to_fahrenheit, fahrenheit_to_celsius};

// Re-export commonly used types from submodules
pub use ble::{AdvertisementFilter, BtleplugConnector, GattClient, GattConnector};
pub use data::{BatteryReading, TemperatureReading};

//! Data structures for thermometer readings.
//!
//! This module contains the domain values a session delivers to its
//! observer.

pub mod battery;
pub mod temperatures;

pub use battery::{BatteryReading, NOMINAL_MAX_VOLTAGE};
pub use temperatures::TemperatureReading;

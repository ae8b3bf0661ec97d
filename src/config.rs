//! Session configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Units the thermometer displays temperatures in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    #[default]
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnit {
    /// Get a human-readable name for this unit.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Celsius => "Celsius",
            Self::Fahrenheit => "Fahrenheit",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TemperatureUnit {
    type Err = Error;

    /// Parse `c`/`celsius` or `f`/`fahrenheit`, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(Self::Celsius),
            "f" | "fahrenheit" => Ok(Self::Fahrenheit),
            other => Err(Error::InvalidConfiguration {
                reason: format!("unknown temperature unit '{}'", other),
            }),
        }
    }
}

/// Configuration for an iBBQ session.
///
/// Immutable once built; a session takes it by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Configuration {
    connect_timeout: Duration,
    battery_polling_interval: Duration,
    temperature_unit: TemperatureUnit,
}

impl Configuration {
    /// Default time allowed for connecting and the handshake (60 seconds).
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Default battery polling interval (5 minutes).
    pub const DEFAULT_BATTERY_POLLING_INTERVAL: Duration = Duration::from_secs(5 * 60);

    /// Create a configuration.
    ///
    /// # Arguments
    ///
    /// * `connect_timeout` - Deadline for connecting and the handshake
    /// * `battery_polling_interval` - Time between battery requests, zero disables polling
    pub fn new(connect_timeout: Duration, battery_polling_interval: Duration) -> Self {
        Self {
            connect_timeout,
            battery_polling_interval,
            temperature_unit: TemperatureUnit::default(),
        }
    }

    /// Create a configuration from signed second counts, as read from flags
    /// or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if either value is negative.
    ///
    /// # Example
    ///
    /// ```
    /// use ibbq_rust_ble::Configuration;
    ///
    /// let config = Configuration::from_secs(30, 0).unwrap();
    /// assert!(!config.battery_polling_enabled());
    ///
    /// assert!(Configuration::from_secs(-1, 60).is_err());
    /// ```
    pub fn from_secs(connect_timeout_secs: i64, battery_polling_interval_secs: i64) -> Result<Self> {
        let connect_timeout = non_negative_secs("connect timeout", connect_timeout_secs)?;
        let battery_polling_interval =
            non_negative_secs("battery polling interval", battery_polling_interval_secs)?;

        Ok(Self::new(connect_timeout, battery_polling_interval))
    }

    /// Set the units configured on the thermometer during the handshake.
    pub fn with_temperature_unit(mut self, unit: TemperatureUnit) -> Self {
        self.temperature_unit = unit;
        self
    }

    /// Deadline for connecting and the handshake.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Time between battery requests.
    pub fn battery_polling_interval(&self) -> Duration {
        self.battery_polling_interval
    }

    /// Whether periodic battery requests are enabled.
    pub fn battery_polling_enabled(&self) -> bool {
        !self.battery_polling_interval.is_zero()
    }

    /// Units configured on the thermometer.
    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.temperature_unit
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_CONNECT_TIMEOUT,
            Self::DEFAULT_BATTERY_POLLING_INTERVAL,
        )
    }
}

fn non_negative_secs(name: &str, secs: i64) -> Result<Duration> {
    u64::try_from(secs)
        .map(Duration::from_secs)
        .map_err(|_| Error::InvalidConfiguration {
            reason: format!("{} must not be negative, got {}s", name, secs),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.battery_polling_interval(), Duration::from_secs(300));
        assert_eq!(config.temperature_unit(), TemperatureUnit::Celsius);
        assert!(config.battery_polling_enabled());
    }

    #[test]
    fn test_negative_connect_timeout_rejected() {
        match Configuration::from_secs(-5, 60) {
            Err(Error::InvalidConfiguration { reason }) => {
                assert!(reason.contains("connect timeout"))
            }
            other => panic!("expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_polling_interval_rejected() {
        assert!(matches!(
            Configuration::from_secs(10, -1),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_zero_values_accepted() {
        let config = Configuration::from_secs(0, 0).unwrap();
        assert!(config.connect_timeout().is_zero());
        assert!(!config.battery_polling_enabled());
    }

    #[test]
    fn test_with_temperature_unit() {
        let config = Configuration::default().with_temperature_unit(TemperatureUnit::Fahrenheit);
        assert_eq!(config.temperature_unit(), TemperatureUnit::Fahrenheit);
        assert_eq!(config.connect_timeout(), Configuration::DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_temperature_unit_from_str() {
        assert_eq!("c".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Celsius);
        assert_eq!("Celsius".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Celsius);
        assert_eq!("F".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Fahrenheit);
        assert_eq!(
            " fahrenheit ".parse::<TemperatureUnit>().unwrap(),
            TemperatureUnit::Fahrenheit
        );
        assert!("kelvin".parse::<TemperatureUnit>().is_err());
    }
}

//! Temperature readings.

use crate::config::TemperatureUnit;
use crate::utils::{celsius_to_fahrenheit, from_celsius};

/// One real-time frame of probe temperatures.
///
/// Values are in degrees Celsius with 0.1°C resolution, ordered by probe
/// index. Thermometers report a value for every probe socket, plugged in or
/// not.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemperatureReading {
    /// Temperatures per probe in Celsius.
    pub probes: Vec<f64>,
}

impl TemperatureReading {
    /// Create a reading from Celsius values.
    pub fn new(probes: Vec<f64>) -> Self {
        Self { probes }
    }

    /// Number of probes in the frame.
    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Temperature of a single probe in Celsius.
    ///
    /// # Arguments
    ///
    /// * `index` - Probe index, starting at 0
    pub fn probe(&self, index: usize) -> Option<f64> {
        self.probes.get(index).copied()
    }

    /// All temperatures in Celsius.
    pub fn celsius(&self) -> &[f64] {
        &self.probes
    }

    /// All temperatures in Fahrenheit.
    pub fn to_fahrenheit(&self) -> Vec<f64> {
        self.probes.iter().copied().map(celsius_to_fahrenheit).collect()
    }

    /// All temperatures expressed in `unit`.
    pub fn in_unit(&self, unit: TemperatureUnit) -> Vec<f64> {
        self.probes.iter().map(|&c| from_celsius(c, unit)).collect()
    }
}

impl From<Vec<f64>> for TemperatureReading {
    fn from(probes: Vec<f64>) -> Self {
        Self::new(probes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_access() {
        let reading = TemperatureReading::new(vec![21.5, 100.0]);
        assert_eq!(reading.probe_count(), 2);
        assert_eq!(reading.probe(0), Some(21.5));
        assert_eq!(reading.probe(1), Some(100.0));
        assert_eq!(reading.probe(2), None);
    }

    #[test]
    fn test_to_fahrenheit() {
        let reading = TemperatureReading::from(vec![0.0, 100.0]);
        let fahrenheit = reading.to_fahrenheit();
        assert!((fahrenheit[0] - 32.0).abs() < 0.001);
        assert!((fahrenheit[1] - 212.0).abs() < 0.001);
    }

    #[test]
    fn test_in_unit() {
        let reading = TemperatureReading::new(vec![23.0]);
        assert_eq!(reading.in_unit(TemperatureUnit::Celsius), vec![23.0]);
        assert!((reading.in_unit(TemperatureUnit::Fahrenheit)[0] - 73.4).abs() < 0.001);
    }

    #[test]
    fn test_default_is_empty() {
        assert_eq!(TemperatureReading::default().probe_count(), 0);
    }
}

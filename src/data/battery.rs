//! Battery readings.

/// Maximum voltage assumed when the thermometer reports a maximum of zero.
pub const NOMINAL_MAX_VOLTAGE: u16 = 6550;

/// Battery state decoded from a setting result frame.
///
/// `percent` is `100 * current / max` with integer division. It exceeds 100
/// when the battery voltage is above the assumed maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatteryReading {
    /// Current battery voltage as reported by the device.
    pub current_voltage: u16,
    /// Maximum voltage used for the percentage, after the zero substitution.
    pub max_voltage: u16,
    /// Charge in percent.
    pub percent: u32,
}

impl BatteryReading {
    /// Compute a reading from raw voltages.
    ///
    /// A `max_voltage` of 0 means the device did not report one; the
    /// nominal maximum of 6550 is used instead.
    ///
    /// # Example
    ///
    /// ```
    /// use ibbq_rust_ble::BatteryReading;
    ///
    /// let reading = BatteryReading::from_voltages(3300, 0);
    /// assert_eq!(reading.max_voltage, 6550);
    /// assert_eq!(reading.percent, 50);
    /// ```
    pub fn from_voltages(current_voltage: u16, max_voltage: u16) -> Self {
        let max_voltage = if max_voltage == 0 {
            NOMINAL_MAX_VOLTAGE
        } else {
            max_voltage
        };
        let percent = 100 * u32::from(current_voltage) / u32::from(max_voltage);

        Self {
            current_voltage,
            max_voltage,
            percent,
        }
    }

    /// Whether the voltage is above the assumed maximum.
    pub fn is_overcharged(&self) -> bool {
        self.percent > 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_max_uses_nominal() {
        let reading = BatteryReading::from_voltages(3300, 0);
        assert_eq!(reading.max_voltage, NOMINAL_MAX_VOLTAGE);
        assert_eq!(reading.percent, 50);
    }

    #[test]
    fn test_full_battery() {
        assert_eq!(BatteryReading::from_voltages(6550, 6550).percent, 100);
    }

    #[test]
    fn test_truncating_division() {
        // 100 * 6549 / 6550 = 99.98..., truncated
        assert_eq!(BatteryReading::from_voltages(6549, 6550).percent, 99);
        assert_eq!(BatteryReading::from_voltages(0, 6550).percent, 0);
    }

    #[test]
    fn test_above_max() {
        let reading = BatteryReading::from_voltages(6000, 5000);
        assert_eq!(reading.percent, 120);
        assert!(reading.is_overcharged());
        assert_eq!(BatteryReading::from_voltages(u16::MAX, 1).percent, 6_553_500);
    }
}

//! Fixed command payloads written to the thermometer.
//!
//! Setting commands are 6 bytes: a command byte, an argument byte and four
//! bytes of padding. They are written to the setting data characteristic
//! (`fff5`); results come back on the setting result characteristic (`fff1`).

use crate::config::TemperatureUnit;

/// Login credentials written to the account and verify characteristic.
///
/// The device stops responding to setting commands if this is not written
/// first.
pub const CREDENTIALS: [u8; 15] = [
    0x21, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0xb8, 0x22, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Length of every setting command.
pub const SETTING_COMMAND_LEN: usize = 6;

/// Tag of the battery frame on the setting result characteristic.
pub const BATTERY_RESULT_TAG: u8 = 0x24;

const REAL_TIME_DATA_ENABLE: [u8; SETTING_COMMAND_LEN] = [0x0B, 0x01, 0x00, 0x00, 0x00, 0x00];
const UNITS_FAHRENHEIT: [u8; SETTING_COMMAND_LEN] = [0x02, 0x01, 0x00, 0x00, 0x00, 0x00];
const UNITS_CELSIUS: [u8; SETTING_COMMAND_LEN] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
const BATTERY_LEVEL: [u8; SETTING_COMMAND_LEN] = [0x08, BATTERY_RESULT_TAG, 0x00, 0x00, 0x00, 0x00];

/// Commands written to the setting data characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingCommand {
    /// Start sending probe temperatures on the real-time data characteristic.
    EnableRealTimeData,
    /// Set the display units of the thermometer.
    SetUnits(TemperatureUnit),
    /// Request a battery frame on the setting result characteristic.
    RequestBatteryLevel,
}

impl SettingCommand {
    /// Wire bytes of this command.
    pub fn to_bytes(&self) -> [u8; SETTING_COMMAND_LEN] {
        match self {
            Self::EnableRealTimeData => REAL_TIME_DATA_ENABLE,
            Self::SetUnits(TemperatureUnit::Celsius) => UNITS_CELSIUS,
            Self::SetUnits(TemperatureUnit::Fahrenheit) => UNITS_FAHRENHEIT,
            Self::RequestBatteryLevel => BATTERY_LEVEL,
        }
    }
}

impl std::fmt::Display for SettingCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnableRealTimeData => write!(f, "enable real-time data"),
            Self::SetUnits(unit) => write!(f, "set units to {}", unit),
            Self::RequestBatteryLevel => write!(f, "request battery level"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials() {
        assert_eq!(CREDENTIALS.len(), 15);
        assert_eq!(&CREDENTIALS[..3], &[0x21, 0x07, 0x06]);
        assert_eq!(&CREDENTIALS[8..10], &[0xb8, 0x22]);
    }

    #[test]
    fn test_setting_command_bytes() {
        assert_eq!(
            SettingCommand::EnableRealTimeData.to_bytes(),
            [0x0B, 0x01, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            SettingCommand::SetUnits(TemperatureUnit::Celsius).to_bytes(),
            [0x02, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            SettingCommand::SetUnits(TemperatureUnit::Fahrenheit).to_bytes(),
            [0x02, 0x01, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            SettingCommand::RequestBatteryLevel.to_bytes(),
            [0x08, 0x24, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_battery_request_matches_result_tag() {
        assert_eq!(
            SettingCommand::RequestBatteryLevel.to_bytes()[1],
            BATTERY_RESULT_TAG
        );
    }
}

//! Notification frame decoding.
//!
//! Pure transforms from notification payloads to readings. Nothing here does
//! I/O, so every frame layout is covered by unit tests.

use crate::data::{BatteryReading, TemperatureReading};
use crate::error::{Error, Result};
use crate::protocol::commands::BATTERY_RESULT_TAG;

/// Minimum size of a battery frame: tag + current voltage + max voltage.
const BATTERY_FRAME_LEN: usize = 5;

/// Decode a real-time data frame.
///
/// Each probe is a little-endian `u16` in tenths of a degree Celsius, so a
/// frame of `2n` bytes carries `n` probes.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] for empty or odd-length frames.
///
/// # Example
///
/// ```
/// use ibbq_rust_ble::protocol::decode_real_time_data;
///
/// let reading = decode_real_time_data(&[0xD7, 0x00, 0xE8, 0x03]).unwrap();
/// assert_eq!(reading.probes, vec![21.5, 100.0]);
/// ```
pub fn decode_real_time_data(data: &[u8]) -> Result<TemperatureReading> {
    if data.is_empty() || data.len() % 2 != 0 {
        return Err(Error::InvalidData {
            context: format!(
                "Real-time data frame must be a non-zero even length, got {} bytes",
                data.len()
            ),
        });
    }

    let probes = data
        .chunks_exact(2)
        .map(|raw| f64::from(u16::from_le_bytes([raw[0], raw[1]])) / 10.0)
        .collect();

    Ok(TemperatureReading::new(probes))
}

/// Decode a setting result frame.
///
/// Only battery frames (tag `0x24`) carry a value. Results of other setting
/// commands decode to `Ok(None)`.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] for an empty frame or a truncated battery
/// frame.
pub fn decode_setting_result(data: &[u8]) -> Result<Option<BatteryReading>> {
    let Some(&tag) = data.first() else {
        return Err(Error::InvalidData {
            context: "Empty setting result frame".to_string(),
        });
    };

    if tag != BATTERY_RESULT_TAG {
        return Ok(None);
    }

    if data.len() < BATTERY_FRAME_LEN {
        return Err(Error::InvalidData {
            context: format!(
                "Battery frame too short: {} bytes (need at least {})",
                data.len(),
                BATTERY_FRAME_LEN
            ),
        });
    }

    let current_voltage = u16::from_le_bytes([data[1], data[2]]);
    let max_voltage = u16::from_le_bytes([data[3], data[4]]);

    Ok(Some(BatteryReading::from_voltages(current_voltage, max_voltage)))
}

/// Format a frame as lowercase hex for logging.
pub fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_decode_real_time_data() {
        // 23.0°C, 150.5°C, 0.0°C, unplugged probe marker
        let data = [0xE6, 0x00, 0xE1, 0x05, 0x00, 0x00, 0xF6, 0xFF];
        let reading = decode_real_time_data(&data).unwrap();
        assert_eq!(reading.probes, vec![23.0, 150.5, 0.0, 6552.6]);
    }

    #[test]
    fn test_decode_real_time_data_rejects_malformed() {
        assert!(matches!(
            decode_real_time_data(&[]),
            Err(Error::InvalidData { .. })
        ));
        assert!(matches!(
            decode_real_time_data(&[0x01]),
            Err(Error::InvalidData { .. })
        ));
        assert!(matches!(
            decode_real_time_data(&[0x01, 0x02, 0x03]),
            Err(Error::InvalidData { .. })
        ));
    }

    #[test]
    fn test_battery_with_zero_max() {
        // 3300 = 0x0CE4
        let data = [0x24, 0xE4, 0x0C, 0x00, 0x00, 0x00];
        let reading = decode_setting_result(&data).unwrap().unwrap();
        assert_eq!(reading.current_voltage, 3300);
        assert_eq!(reading.max_voltage, 6550);
        assert_eq!(reading.percent, 50);
    }

    #[test]
    fn test_battery_full() {
        // 6550 = 0x1996
        let data = [0x24, 0x96, 0x19, 0x96, 0x19];
        let reading = decode_setting_result(&data).unwrap().unwrap();
        assert_eq!(reading.percent, 100);
    }

    #[test]
    fn test_non_battery_tag_is_ignored() {
        for tag in [0x00, 0x02, 0x0B, 0x23, 0x25, 0xFF] {
            let data = [tag, 0x96, 0x19, 0x96, 0x19];
            assert_eq!(decode_setting_result(&data).unwrap(), None);
        }
        // Non-battery results may be any length.
        assert_eq!(decode_setting_result(&[0x0B]).unwrap(), None);
    }

    #[test]
    fn test_setting_result_rejects_malformed() {
        assert!(matches!(
            decode_setting_result(&[]),
            Err(Error::InvalidData { .. })
        ));
        assert!(matches!(
            decode_setting_result(&[0x24, 0x96, 0x19, 0x96]),
            Err(Error::InvalidData { .. })
        ));
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x24, 0x0b, 0xff]), "240bff");
        assert_eq!(hex(&[]), "");
    }

    proptest! {
        #[test]
        fn prop_real_time_data_one_value_per_u16(raw in proptest::collection::vec(any::<u16>(), 1..16)) {
            let data: Vec<u8> = raw.iter().flat_map(|v| v.to_le_bytes()).collect();
            let reading = decode_real_time_data(&data).unwrap();

            prop_assert_eq!(reading.probe_count(), raw.len());
            for (value, raw) in reading.probes.iter().zip(&raw) {
                prop_assert_eq!(*value, f64::from(*raw) / 10.0);
            }
        }

        #[test]
        fn prop_odd_frames_never_panic(data in proptest::collection::vec(any::<u8>(), 0..33)) {
            let result = decode_real_time_data(&data);
            prop_assert_eq!(result.is_ok(), !data.is_empty() && data.len() % 2 == 0);
        }

        #[test]
        fn prop_battery_percent(current in any::<u16>(), max in any::<u16>()) {
            let mut data = vec![BATTERY_RESULT_TAG];
            data.extend_from_slice(&current.to_le_bytes());
            data.extend_from_slice(&max.to_le_bytes());

            let reading = decode_setting_result(&data).unwrap().unwrap();
            let expected_max = if max == 0 { 6550 } else { u32::from(max) };
            prop_assert_eq!(reading.percent, 100 * u32::from(current) / expected_max);
        }
    }
}

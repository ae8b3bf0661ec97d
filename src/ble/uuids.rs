//! BLE Service and Characteristic UUIDs.
//!
//! The iBBQ protocol uses 16-bit UUIDs expanded onto the Bluetooth base UUID.

use uuid::Uuid;

/// The Bluetooth SIG base UUID that 16-bit UUIDs are expanded onto.
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_00805f9b34fb;

/// iBBQ primary service UUID.
pub const IBBQ_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_fff0_0000_1000_8000_00805f9b34fb);
/// Setting result characteristic UUID (Notify).
pub const SETTING_RESULT_UUID: Uuid = Uuid::from_u128(0x0000_fff1_0000_1000_8000_00805f9b34fb);
/// Account and verify (login) characteristic UUID (Write).
pub const ACCOUNT_AND_VERIFY_UUID: Uuid =
    Uuid::from_u128(0x0000_fff2_0000_1000_8000_00805f9b34fb);
/// History data characteristic UUID (Notify).
pub const HISTORY_DATA_UUID: Uuid = Uuid::from_u128(0x0000_fff3_0000_1000_8000_00805f9b34fb);
/// Real-time data characteristic UUID (Notify).
pub const REAL_TIME_DATA_UUID: Uuid = Uuid::from_u128(0x0000_fff4_0000_1000_8000_00805f9b34fb);
/// Setting data characteristic UUID (Write).
pub const SETTING_DATA_UUID: Uuid = Uuid::from_u128(0x0000_fff5_0000_1000_8000_00805f9b34fb);

/// Advertised local name of iBBQ thermometers.
pub const DEVICE_NAME: &str = "iBBQ";

/// Expand a 16-bit UUID onto the Bluetooth base UUID.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Parse a short hex token such as `"fff4"` into a full UUID.
///
/// Full hyphenated UUIDs are accepted as well.
pub fn parse_uuid(token: &str) -> Option<Uuid> {
    if token.len() == 4 {
        return u16::from_str_radix(token, 16).ok().map(uuid_from_u16);
    }
    Uuid::parse_str(token).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            REAL_TIME_DATA_UUID.to_string(),
            "0000fff4-0000-1000-8000-00805f9b34fb"
        );
        assert!(SETTING_RESULT_UUID.to_string().starts_with("0000fff1"));
    }

    #[test]
    fn test_uuid_from_u16() {
        assert_eq!(uuid_from_u16(0xfff0), IBBQ_SERVICE_UUID);
        assert_eq!(uuid_from_u16(0xfff5), SETTING_DATA_UUID);
    }

    #[test]
    fn test_parse_uuid() {
        assert_eq!(parse_uuid("fff2"), Some(ACCOUNT_AND_VERIFY_UUID));
        assert_eq!(parse_uuid("FFF3"), Some(HISTORY_DATA_UUID));
        assert_eq!(
            parse_uuid("0000fff4-0000-1000-8000-00805f9b34fb"),
            Some(REAL_TIME_DATA_UUID)
        );
        assert_eq!(parse_uuid("zzzz"), None);
    }
}

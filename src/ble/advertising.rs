//! Advertisement matching.
//!
//! iBBQ thermometers carry no manufacturer data worth parsing; they are
//! recognised by their advertised local name.

use uuid::Uuid;

use crate::ble::uuids::DEVICE_NAME;

/// The parts of an advertisement used to pick a device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    /// Peripheral address or platform identifier.
    pub address: String,
    /// Advertised local name, if any.
    pub local_name: Option<String>,
    /// Whether the device accepts connections.
    pub connectable: bool,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
}

/// Selects the device a session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementFilter {
    local_name: String,
}

impl AdvertisementFilter {
    /// Filter for any iBBQ thermometer.
    pub fn ibbq() -> Self {
        Self::with_local_name(DEVICE_NAME)
    }

    /// Filter on a different local name.
    pub fn with_local_name(name: impl Into<String>) -> Self {
        Self {
            local_name: name.into(),
        }
    }

    /// The local name this filter accepts.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Check whether an advertisement is accepted.
    ///
    /// The local name must match exactly, ignoring case, and the device must
    /// be connectable.
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        advertisement.connectable
            && advertisement
                .local_name
                .as_deref()
                .map(|name| name.eq_ignore_ascii_case(&self.local_name))
                .unwrap_or(false)
    }
}

impl Default for AdvertisementFilter {
    fn default() -> Self {
        Self::ibbq()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advertisement(name: Option<&str>, connectable: bool) -> Advertisement {
        Advertisement {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            local_name: name.map(str::to_string),
            connectable,
            ..Default::default()
        }
    }

    #[test]
    fn test_matches_case_insensitive() {
        let filter = AdvertisementFilter::ibbq();
        assert!(filter.matches(&advertisement(Some("iBBQ"), true)));
        assert!(filter.matches(&advertisement(Some("IBBQ"), true)));
        assert!(filter.matches(&advertisement(Some("ibbq"), true)));
    }

    #[test]
    fn test_rejects_non_matching() {
        let filter = AdvertisementFilter::ibbq();
        assert!(!filter.matches(&advertisement(Some("iBBQ"), false)));
        assert!(!filter.matches(&advertisement(Some("iBBQ-2"), true)));
        assert!(!filter.matches(&advertisement(Some("xBBQ"), true)));
        assert!(!filter.matches(&advertisement(None, true)));
    }

    #[test]
    fn test_custom_name() {
        let filter = AdvertisementFilter::with_local_name("Grill");
        assert_eq!(filter.local_name(), "Grill");
        assert!(filter.matches(&advertisement(Some("grill"), true)));
        assert!(!filter.matches(&advertisement(Some("iBBQ"), true)));
    }
}

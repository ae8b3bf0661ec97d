//! GATT characteristic identification.
//!
//! Maps the five protocol-level iBBQ characteristics onto the handles a
//! transport reports after discovery.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;
use uuid::Uuid;

use crate::ble::uuids::*;
use crate::error::{Error, Result};

/// The protocol-level characteristics of an iBBQ thermometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicId {
    /// Results of setting commands, including battery data (`fff1`, notify).
    SettingResult,
    /// Login credentials (`fff2`, write).
    AccountAndVerify,
    /// Stored history data (`fff3`, notify).
    HistoryData,
    /// Live probe temperatures (`fff4`, notify).
    RealTimeData,
    /// Setting commands (`fff5`, write).
    SettingData,
}

impl CharacteristicId {
    /// All characteristics a session needs, in discovery order.
    pub const ALL: [Self; 5] = [
        Self::SettingResult,
        Self::AccountAndVerify,
        Self::HistoryData,
        Self::RealTimeData,
        Self::SettingData,
    ];

    /// Short hex token used by the device documentation.
    pub fn short_uuid(&self) -> &'static str {
        match self {
            Self::SettingResult => "fff1",
            Self::AccountAndVerify => "fff2",
            Self::HistoryData => "fff3",
            Self::RealTimeData => "fff4",
            Self::SettingData => "fff5",
        }
    }

    /// Full 128-bit UUID.
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::SettingResult => SETTING_RESULT_UUID,
            Self::AccountAndVerify => ACCOUNT_AND_VERIFY_UUID,
            Self::HistoryData => HISTORY_DATA_UUID,
            Self::RealTimeData => REAL_TIME_DATA_UUID,
            Self::SettingData => SETTING_DATA_UUID,
        }
    }

    /// Look up the protocol identifier for a UUID.
    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.uuid() == *uuid)
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SettingResult => "setting result",
            Self::AccountAndVerify => "account and verify",
            Self::HistoryData => "history data",
            Self::RealTimeData => "real-time data",
            Self::SettingData => "setting data",
        };
        write!(f, "{} ({})", name, self.short_uuid())
    }
}

/// Transport-level handle for a discovered characteristic.
///
/// Transports resolve the handle back to their own characteristic objects;
/// the session treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    /// UUID of the characteristic.
    pub uuid: Uuid,
    /// UUID of the service that owns the characteristic.
    pub service_uuid: Uuid,
}

impl CharacteristicHandle {
    /// Create a new handle.
    pub fn new(uuid: Uuid, service_uuid: Uuid) -> Self {
        Self { uuid, service_uuid }
    }
}

/// The full set of iBBQ characteristics found on a connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicSet {
    handles: HashMap<CharacteristicId, CharacteristicHandle>,
}

impl CharacteristicSet {
    /// Build the set from discovered characteristics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CharacteristicNotFound`] naming the first required
    /// characteristic that was not discovered.
    pub fn from_discovered(discovered: impl IntoIterator<Item = CharacteristicHandle>) -> Result<Self> {
        let mut handles = HashMap::new();

        for handle in discovered {
            match CharacteristicId::from_uuid(&handle.uuid) {
                Some(id) => {
                    debug!(characteristic = %id, service = %handle.service_uuid, "Found characteristic");
                    handles.entry(id).or_insert(handle);
                }
                None => debug!(uuid = %handle.uuid, "Ignoring unknown characteristic"),
            }
        }

        if let Some(missing) = CharacteristicId::ALL
            .into_iter()
            .find(|id| !handles.contains_key(id))
        {
            return Err(Error::CharacteristicNotFound {
                uuid: missing.short_uuid().to_string(),
            });
        }

        Ok(Self { handles })
    }

    /// Get the handle for a protocol characteristic.
    pub fn get(&self, id: CharacteristicId) -> Result<&CharacteristicHandle> {
        self.handles
            .get(&id)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: id.short_uuid().to_string(),
            })
    }

    /// Number of characteristics in the set.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

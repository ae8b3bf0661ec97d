//! BLE communication module.
//!
//! This module provides the GATT client capability a session runs on and
//! its btleplug implementation.

pub mod advertising;
pub mod characteristics;
pub mod connection;
pub mod gatt;
pub mod scanner;
pub mod uuids;

pub use advertising::{Advertisement, AdvertisementFilter};
pub use characteristics::{CharacteristicHandle, CharacteristicId, CharacteristicSet};
pub use connection::BtleplugClient;
pub use gatt::{
    DisconnectNotifier, DisconnectSignal, GattClient, GattConnector, NotificationHandler,
    WriteMode,
};
pub use scanner::BtleplugConnector;
pub use uuids::*;

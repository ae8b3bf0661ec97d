//! Error types for the ibbq-rust-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// A GATT operation failed in the transport layer.
    #[error("Transport error: {context}")]
    Transport {
        /// Description of the failed operation.
        context: String,
    },

    /// Operation requires a connection but the thermometer is not connected.
    #[error("Thermometer not connected")]
    NotConnected,

    /// Failed to establish a connection to the thermometer.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// Invalid data was received from the thermometer.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// Connecting or the handshake did not finish before the connect timeout.
    #[error("Timed out while connecting")]
    Timeout,

    /// The upstream token was cancelled before the connection was established.
    #[error("Cancelled while connecting")]
    Cancelled,

    /// The session configuration was rejected.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration is invalid.
        reason: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },
}

impl Error {
    /// Build a [`Error::Transport`] from anything displayable.
    pub fn transport(context: impl std::fmt::Display) -> Self {
        Self::Transport {
            context: context.to_string(),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CharacteristicNotFound {
            uuid: "fff4".to_string(),
        };
        assert_eq!(err.to_string(), "Characteristic not found: fff4");
        assert_eq!(Error::Timeout.to_string(), "Timed out while connecting");
        assert_eq!(Error::Cancelled.to_string(), "Cancelled while connecting");
        assert_eq!(
            Error::transport("write rejected").to_string(),
            "Transport error: write rejected"
        );
    }
}

//! The GATT client capability the session is built on.
//!
//! A session never talks to a platform BLE stack directly. It asks a
//! [`GattConnector`] for a [`GattClient`] and drives the handshake through
//! that client, which keeps the core testable against
//! [`crate::mock::MockConnector`] and lets hosting applications pick the
//! platform adapter at runtime.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

use crate::ble::advertising::AdvertisementFilter;
use crate::ble::characteristics::CharacteristicHandle;
use crate::error::Result;

/// Callback invoked by a transport for every notification on a subscribed
/// characteristic.
///
/// Transports call it from their delivery loop, so it must return quickly.
pub type NotificationHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

/// How a characteristic write is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Wait for the device to acknowledge the write.
    #[default]
    WithResponse,
    /// Fire and forget.
    WithoutResponse,
}

/// Establishes connections to thermometers.
#[async_trait]
pub trait GattConnector: Send + Sync {
    /// Find a device accepted by `filter` and connect to it.
    ///
    /// Implementations may wait indefinitely for a matching advertisement;
    /// the session bounds the call with its connect timeout.
    async fn connect(&self, filter: &AdvertisementFilter) -> Result<Arc<dyn GattClient>>;
}

/// A live GATT connection to one device.
#[async_trait]
pub trait GattClient: Send + Sync {
    /// Human-readable device address, used for logging.
    fn address(&self) -> String;

    /// Discover all characteristics of all services.
    async fn discover_characteristics(&self) -> Result<Vec<CharacteristicHandle>>;

    /// Write `data` to a characteristic.
    async fn write_characteristic(
        &self,
        characteristic: &CharacteristicHandle,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<()>;

    /// Enable notifications on a characteristic and route them to `handler`.
    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        handler: NotificationHandler,
    ) -> Result<()>;

    /// One-shot signal that fires when the device connection is gone.
    fn disconnected(&self) -> DisconnectSignal;

    /// Ask the transport to tear down the connection.
    ///
    /// Completion is reported through [`GattClient::disconnected`].
    async fn cancel_connection(&self) -> Result<()>;
}

/// Sending side of a [`DisconnectSignal`], owned by the transport.
#[derive(Debug)]
pub struct DisconnectNotifier {
    tx: watch::Sender<bool>,
}

impl DisconnectNotifier {
    /// Create a notifier that has not fired yet.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal. Only the first call has an effect.
    ///
    /// Returns `true` if this call fired it.
    pub fn notify(&self) -> bool {
        self.tx.send_if_modified(|fired| !std::mem::replace(fired, true))
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new receiving end.
    pub fn signal(&self) -> DisconnectSignal {
        DisconnectSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for DisconnectNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a one-shot disconnect notification.
#[derive(Debug, Clone)]
pub struct DisconnectSignal {
    rx: watch::Receiver<bool>,
}

impl DisconnectSignal {
    /// Whether the connection is already gone.
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the connection is gone.
    ///
    /// Also returns if the transport dropped its notifier, since nothing can
    /// report on the connection after that.
    pub async fn fired(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_disconnect_signal_fires_once() {
        let notifier = DisconnectNotifier::new();
        let mut signal = notifier.signal();
        assert!(!signal.is_fired());

        assert!(notifier.notify());
        assert!(!notifier.notify());

        tokio::time::timeout(Duration::from_secs(1), signal.fired())
            .await
            .expect("signal should fire");
        assert!(signal.is_fired());
        assert!(notifier.is_fired());
    }

    #[tokio::test]
    async fn test_signal_created_after_fire() {
        let notifier = DisconnectNotifier::new();
        notifier.notify();

        let mut late = notifier.signal();
        assert!(late.is_fired());
        tokio::time::timeout(Duration::from_secs(1), late.fired())
            .await
            .expect("late signal should complete immediately");
    }

    #[tokio::test]
    async fn test_signal_completes_when_notifier_dropped() {
        let notifier = DisconnectNotifier::new();
        let mut signal = notifier.signal();
        drop(notifier);

        tokio::time::timeout(Duration::from_secs(1), signal.fired())
            .await
            .expect("signal should complete when the transport goes away");
    }

    #[test]
    fn test_write_mode_default() {
        assert_eq!(WriteMode::default(), WriteMode::WithResponse);
    }
}

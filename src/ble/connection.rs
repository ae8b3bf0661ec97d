//! A btleplug peripheral as a [`GattClient`].
//!
//! Caches discovered characteristics, routes notifications to the handler
//! registered per characteristic and reports the end of the connection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use bytes::Bytes;
use futures::stream::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::ble::characteristics::CharacteristicHandle;
use crate::ble::gatt::{
    DisconnectNotifier, DisconnectSignal, GattClient, NotificationHandler, WriteMode,
};
use crate::error::{Error, Result};

/// A connected btleplug peripheral.
pub struct BtleplugClient {
    /// The connected peripheral.
    peripheral: Peripheral,
    /// Printable address.
    address: String,
    /// Cached characteristics by UUID.
    characteristics: RwLock<HashMap<Uuid, Characteristic>>,
    /// Notification handlers by characteristic UUID.
    handlers: Arc<RwLock<HashMap<Uuid, NotificationHandler>>>,
    /// Fired when the adapter reports the peripheral gone.
    disconnect: Arc<DisconnectNotifier>,
    /// Handle to the notification pump task.
    notification_pump: Mutex<Option<JoinHandle<()>>>,
    /// Handle to the adapter event watcher.
    event_watcher: JoinHandle<()>,
}

impl BtleplugClient {
    /// Wrap an already connected peripheral.
    pub async fn new(adapter: &Adapter, peripheral: Peripheral) -> Result<Self> {
        let address = peripheral.address().to_string();
        let disconnect = Arc::new(DisconnectNotifier::new());

        // Subscribe before checking the link so a drop in between is not missed.
        let mut events = adapter.events().await.map_err(Error::Bluetooth)?;
        if !peripheral.is_connected().await.unwrap_or(false) {
            disconnect.notify();
        }

        let id = peripheral.id();
        let notifier = disconnect.clone();
        let event_watcher = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(disconnected) = event {
                    if disconnected == id {
                        info!("Peripheral {:?} disconnected", id);
                        notifier.notify();
                        return;
                    }
                }
            }
            debug!("Adapter event stream ended");
            notifier.notify();
        });

        Ok(Self {
            peripheral,
            address,
            characteristics: RwLock::new(HashMap::new()),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            disconnect,
            notification_pump: Mutex::new(None),
            event_watcher,
        })
    }

    fn resolve(&self, handle: &CharacteristicHandle) -> Result<Characteristic> {
        self.characteristics
            .read()
            .get(&handle.uuid)
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: handle.uuid.to_string(),
            })
    }

    /// Start routing notifications to handlers, once per client.
    async fn ensure_notification_pump(&self) -> Result<()> {
        if self.notification_pump.lock().is_some() {
            return Ok(());
        }

        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(Error::Bluetooth)?;
        let handlers = self.handlers.clone();

        let handle = tokio::spawn(async move {
            debug!("Notification pump started");
            while let Some(notification) = notifications.next().await {
                trace!(
                    "Notification received from {}: {} bytes",
                    notification.uuid,
                    notification.value.len()
                );
                let handler = handlers.read().get(&notification.uuid).cloned();
                match handler {
                    Some(handler) => handler(Bytes::from(notification.value)),
                    None => trace!("No handler for {}", notification.uuid),
                }
            }
            debug!("Notification pump stopped");
        });

        let mut pump = self.notification_pump.lock();
        if pump.is_some() {
            // Another subscribe raced us; keep the first pump.
            handle.abort();
        } else {
            *pump = Some(handle);
        }

        Ok(())
    }
}

#[async_trait]
impl GattClient for BtleplugClient {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn discover_characteristics(&self) -> Result<Vec<CharacteristicHandle>> {
        self.peripheral
            .discover_services()
            .await
            .map_err(Error::Bluetooth)?;

        let mut chars = self.characteristics.write();
        chars.clear();

        let mut discovered = Vec::new();
        for service in self.peripheral.services() {
            for characteristic in service.characteristics {
                trace!(
                    "Found characteristic: {} in service {}",
                    characteristic.uuid,
                    service.uuid
                );
                discovered.push(CharacteristicHandle::new(
                    characteristic.uuid,
                    characteristic.service_uuid,
                ));
                chars.insert(characteristic.uuid, characteristic);
            }
        }

        debug!("Discovered {} characteristics", chars.len());

        Ok(discovered)
    }

    async fn write_characteristic(
        &self,
        characteristic: &CharacteristicHandle,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<()> {
        let target = self.resolve(characteristic)?;

        let write_type = match mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        };

        self.peripheral
            .write(&target, data, write_type)
            .await
            .map_err(Error::Bluetooth)?;

        trace!(
            "Wrote {} bytes to characteristic {}",
            data.len(),
            characteristic.uuid
        );

        Ok(())
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        handler: NotificationHandler,
    ) -> Result<()> {
        let target = self.resolve(characteristic)?;

        self.handlers.write().insert(target.uuid, handler);
        self.ensure_notification_pump().await?;

        self.peripheral
            .subscribe(&target)
            .await
            .map_err(Error::Bluetooth)?;

        debug!("Subscribed to notifications from {}", target.uuid);

        Ok(())
    }

    fn disconnected(&self) -> DisconnectSignal {
        self.disconnect.signal()
    }

    async fn cancel_connection(&self) -> Result<()> {
        self.peripheral
            .disconnect()
            .await
            .map_err(Error::Bluetooth)?;

        // Not every platform reports self-initiated disconnects as events.
        self.disconnect.notify();
        Ok(())
    }
}

impl Drop for BtleplugClient {
    fn drop(&mut self) {
        self.event_watcher.abort();
        if let Some(handle) = self.notification_pump.lock().take() {
            handle.abort();
        }
    }
}

//! BLE scanning and connection establishment on top of btleplug.
//!
//! [`BtleplugConnector`] is the platform implementation of
//! [`GattConnector`]: it scans until an advertisement passes the session's
//! filter, then connects to that peripheral.

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use tracing::{debug, info, trace, warn};

use crate::ble::advertising::{Advertisement, AdvertisementFilter};
use crate::ble::connection::BtleplugClient;
use crate::ble::gatt::{GattClient, GattConnector};
use crate::error::{Error, Result};

/// Connects to thermometers through a btleplug adapter.
#[derive(Clone)]
pub struct BtleplugConnector {
    /// The BLE adapter used for scanning and connecting.
    adapter: Adapter,
}

impl BtleplugConnector {
    /// Create a connector on the first Bluetooth adapter of this system.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn default_adapter() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self { adapter })
    }

    /// Create a connector with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Build the advertisement view of a peripheral, if it has properties.
    async fn advertisement(peripheral: &Peripheral) -> Option<Advertisement> {
        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return None,
        };

        // btleplug only surfaces advertisements that can be connected to.
        let advertisement = Advertisement {
            address: properties.address.to_string(),
            local_name: properties.local_name,
            connectable: true,
            rssi: properties.rssi,
            services: properties.services,
        };

        debug!(
            address = %advertisement.address,
            connectable = advertisement.connectable,
            rssi = ?advertisement.rssi,
            name = ?advertisement.local_name,
            services = ?advertisement.services,
            "Found advertisement"
        );

        Some(advertisement)
    }

    /// Return the peripheral behind `id` if its advertisement passes `filter`.
    async fn matching(&self, id: &PeripheralId, filter: &AdvertisementFilter) -> Option<Peripheral> {
        let peripheral = match self.adapter.peripheral(id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return None;
            }
        };

        let advertisement = Self::advertisement(&peripheral).await?;
        filter.matches(&advertisement).then_some(peripheral)
    }

    /// Scan until a matching peripheral shows up.
    async fn scan_for(&self, filter: &AdvertisementFilter) -> Result<Peripheral> {
        let mut events = self.adapter.events().await.map_err(Error::Bluetooth)?;

        info!(name = filter.local_name(), "Scanning for thermometer");
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;
        let _scan = ScanGuard {
            adapter: self.adapter.clone(),
        };

        // The adapter may already know the device from an earlier scan.
        for peripheral in self.adapter.peripherals().await.map_err(Error::Bluetooth)? {
            if let Some(found) = self.matching(&peripheral.id(), filter).await {
                return Ok(found);
            }
        }

        while let Some(event) = events.next().await {
            match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                    trace!("Device seen: {:?}", id);
                    if let Some(found) = self.matching(&id, filter).await {
                        return Ok(found);
                    }
                }
                CentralEvent::StateUpdate(state) => {
                    debug!("Adapter state changed: {:?}", state);
                }
                _ => {}
            }
        }

        Err(Error::ConnectionFailed {
            reason: "adapter event stream ended while scanning".to_string(),
        })
    }
}

#[async_trait]
impl GattConnector for BtleplugConnector {
    async fn connect(&self, filter: &AdvertisementFilter) -> Result<Arc<dyn GattClient>> {
        let peripheral = self.scan_for(filter).await?;

        info!(address = %peripheral.address(), "Connecting to device");
        peripheral.connect().await.map_err(Error::Bluetooth)?;

        let client: Arc<dyn GattClient> =
            Arc::new(BtleplugClient::new(&self.adapter, peripheral).await?);
        Ok(client)
    }
}

/// Stops the scan when connection establishment finishes or is abandoned.
struct ScanGuard {
    adapter: Adapter,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let adapter = self.adapter.clone();
        runtime.spawn(async move {
            if let Err(e) = adapter.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<BtleplugConnector>();
    }
}

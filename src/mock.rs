//! In-memory GATT transport for testing.
//!
//! [`MockConnector`] and [`MockGattClient`] implement the GATT capability
//! without Bluetooth hardware, so sessions can be exercised in unit tests of
//! this crate and of hosting applications.
//!
//! # Features
//!
//! - **Call log**: every transport operation is recorded in order
//! - **Failure injection**: fail discovery, or the write/subscribe on a given
//!   characteristic, or every operation from the n-th call on
//! - **Latency simulation**: delay every operation
//! - **Notification injection**: push frames to subscribed handlers
//! - **Disconnect triggering**: simulate the device going away

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::ble::advertising::AdvertisementFilter;
use crate::ble::characteristics::{CharacteristicHandle, CharacteristicId};
use crate::ble::gatt::{
    DisconnectNotifier, DisconnectSignal, GattClient, GattConnector, NotificationHandler,
    WriteMode,
};
use crate::ble::uuids::IBBQ_SERVICE_UUID;
use crate::error::{Error, Result};

/// A transport operation recorded by [`MockGattClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `discover_characteristics` was called.
    Discover,
    /// `write_characteristic` was called.
    Write {
        /// Target characteristic.
        characteristic: CharacteristicId,
        /// Bytes written.
        data: Vec<u8>,
    },
    /// `subscribe` was called.
    Subscribe {
        /// Target characteristic.
        characteristic: CharacteristicId,
    },
    /// `cancel_connection` was called.
    CancelConnection,
}

/// A fake thermometer connection.
///
/// # Example
///
/// ```
/// use ibbq_rust_ble::ble::CharacteristicId;
/// use ibbq_rust_ble::mock::MockGattClient;
///
/// let client = MockGattClient::new();
/// client.fail_write_to(CharacteristicId::AccountAndVerify);
/// assert!(client.calls().is_empty());
/// ```
pub struct MockGattClient {
    address: String,
    characteristics: Mutex<Vec<CharacteristicHandle>>,
    calls: Mutex<Vec<MockCall>>,
    call_count: AtomicUsize,
    fail_from_call: Mutex<Option<usize>>,
    fail_discover: AtomicBool,
    failing_writes: Mutex<HashSet<CharacteristicId>>,
    failing_subscriptions: Mutex<HashSet<CharacteristicId>>,
    latency: Mutex<Duration>,
    handlers: Mutex<HashMap<CharacteristicId, NotificationHandler>>,
    disconnect: Mutex<Arc<DisconnectNotifier>>,
    disconnect_on_cancel: AtomicBool,
}

impl MockGattClient {
    /// Create a client exposing all iBBQ characteristics.
    pub fn new() -> Self {
        Self {
            address: "00:00:00:00:00:00".to_string(),
            characteristics: Mutex::new(
                CharacteristicId::ALL
                    .into_iter()
                    .map(|id| CharacteristicHandle::new(id.uuid(), IBBQ_SERVICE_UUID))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            fail_from_call: Mutex::new(None),
            fail_discover: AtomicBool::new(false),
            failing_writes: Mutex::new(HashSet::new()),
            failing_subscriptions: Mutex::new(HashSet::new()),
            latency: Mutex::new(Duration::ZERO),
            handlers: Mutex::new(HashMap::new()),
            disconnect: Mutex::new(Arc::new(DisconnectNotifier::new())),
            disconnect_on_cancel: AtomicBool::new(true),
        }
    }

    /// Remove a characteristic from discovery results.
    pub fn without_characteristic(self, id: CharacteristicId) -> Self {
        self.characteristics
            .lock()
            .retain(|handle| handle.uuid != id.uuid());
        self
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Fail discovery.
    pub fn fail_discover(&self) {
        self.fail_discover.store(true, Ordering::SeqCst);
    }

    /// Fail writes to a characteristic.
    pub fn fail_write_to(&self, id: CharacteristicId) {
        self.failing_writes.lock().insert(id);
    }

    /// Fail subscriptions to a characteristic.
    pub fn fail_subscribe_to(&self, id: CharacteristicId) {
        self.failing_subscriptions.lock().insert(id);
    }

    /// Fail every operation from the `n`-th (1-based) on.
    pub fn fail_from_call(&self, n: usize) {
        *self.fail_from_call.lock() = Some(n);
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        *self.fail_from_call.lock() = None;
        self.fail_discover.store(false, Ordering::SeqCst);
        self.failing_writes.lock().clear();
        self.failing_subscriptions.lock().clear();
    }

    /// Whether `cancel_connection` reports the disconnect (default `true`).
    pub fn set_disconnect_on_cancel(&self, enabled: bool) {
        self.disconnect_on_cancel.store(enabled, Ordering::SeqCst);
    }

    /// All recorded operations, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded operations.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Payloads written to a characteristic, oldest first.
    pub fn writes_to(&self, id: CharacteristicId) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::Write {
                    characteristic,
                    data,
                } if *characteristic == id => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether a handler is registered for a characteristic.
    pub fn is_subscribed(&self, id: CharacteristicId) -> bool {
        self.handlers.lock().contains_key(&id)
    }

    /// Deliver a notification to the subscribed handler.
    ///
    /// Returns `false` if nothing is subscribed or the connection is gone.
    pub fn notify(&self, id: CharacteristicId, data: &[u8]) -> bool {
        if self.disconnect.lock().is_fired() {
            return false;
        }
        let handler = self.handlers.lock().get(&id).cloned();
        match handler {
            Some(handler) => {
                handler(Bytes::copy_from_slice(data));
                true
            }
            None => false,
        }
    }

    /// Simulate the device dropping the connection.
    pub fn trigger_disconnect(&self) {
        self.disconnect.lock().notify();
    }

    /// Whether the current connection has ended.
    pub fn is_disconnected(&self) -> bool {
        self.disconnect.lock().is_fired()
    }

    /// Start a fresh connection if the previous one ended.
    fn reconnect(&self) {
        let mut disconnect = self.disconnect.lock();
        if disconnect.is_fired() {
            *disconnect = Arc::new(DisconnectNotifier::new());
            self.handlers.lock().clear();
        }
    }

    /// Record a call, apply latency and decide whether it fails.
    async fn record(&self, call: MockCall) -> Result<()> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let n = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

        let failure = match &call {
            _ if self.fail_from_call.lock().map_or(false, |from| n >= from) => {
                Some(format!("injected failure at call {}", n))
            }
            MockCall::Discover if self.fail_discover.load(Ordering::SeqCst) => {
                Some("injected discovery failure".to_string())
            }
            MockCall::Write { characteristic, .. }
                if self.failing_writes.lock().contains(characteristic) =>
            {
                Some(format!("injected write failure on {}", characteristic))
            }
            MockCall::Subscribe { characteristic }
                if self.failing_subscriptions.lock().contains(characteristic) =>
            {
                Some(format!("injected subscribe failure on {}", characteristic))
            }
            _ => None,
        };

        self.calls.lock().push(call);

        match failure {
            Some(context) => Err(Error::transport(context)),
            None => Ok(()),
        }
    }
}

impl Default for MockGattClient {
    fn default() -> Self {
        Self::new()
    }
}

fn protocol_id(handle: &CharacteristicHandle) -> Result<CharacteristicId> {
    CharacteristicId::from_uuid(&handle.uuid).ok_or_else(|| Error::CharacteristicNotFound {
        uuid: handle.uuid.to_string(),
    })
}

#[async_trait]
impl GattClient for MockGattClient {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn discover_characteristics(&self) -> Result<Vec<CharacteristicHandle>> {
        self.record(MockCall::Discover).await?;
        Ok(self.characteristics.lock().clone())
    }

    async fn write_characteristic(
        &self,
        characteristic: &CharacteristicHandle,
        data: &[u8],
        _mode: WriteMode,
    ) -> Result<()> {
        let characteristic = protocol_id(characteristic)?;
        self.record(MockCall::Write {
            characteristic,
            data: data.to_vec(),
        })
        .await
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        handler: NotificationHandler,
    ) -> Result<()> {
        let characteristic = protocol_id(characteristic)?;
        self.record(MockCall::Subscribe { characteristic }).await?;
        self.handlers.lock().insert(characteristic, handler);
        Ok(())
    }

    fn disconnected(&self) -> DisconnectSignal {
        self.disconnect.lock().signal()
    }

    async fn cancel_connection(&self) -> Result<()> {
        self.record(MockCall::CancelConnection).await?;
        if self.disconnect_on_cancel.load(Ordering::SeqCst) {
            self.trigger_disconnect();
        }
        Ok(())
    }
}

/// A connector that always finds the same [`MockGattClient`].
pub struct MockConnector {
    client: Arc<MockGattClient>,
    connect_delay: Mutex<Duration>,
    fail_connect: AtomicBool,
    connects: AtomicUsize,
}

impl MockConnector {
    /// Create a connector handing out `client`.
    pub fn new(client: Arc<MockGattClient>) -> Self {
        Self {
            client,
            connect_delay: Mutex::new(Duration::ZERO),
            fail_connect: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        }
    }

    /// The client handed out on connect.
    pub fn client(&self) -> &Arc<MockGattClient> {
        &self.client
    }

    /// Delay before the device is "found".
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    /// Make connect attempts fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Number of connect attempts that reached the transport.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GattConnector for MockConnector {
    async fn connect(&self, _filter: &AdvertisementFilter) -> Result<Arc<dyn GattClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::ConnectionFailed {
                reason: "injected connect failure".to_string(),
            });
        }

        self.client.reconnect();
        let client: Arc<dyn GattClient> = self.client.clone();
        Ok(client)
    }
}

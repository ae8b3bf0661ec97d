//! The iBBQ session.
//!
//! [`Ibbq`] owns one logical connection to a thermometer at a time. `connect`
//! runs the handshake; afterwards decoded readings flow to the session's
//! [`SessionObserver`] until the connection ends, whoever ends it.
//!
//! Teardown has a single path. Device disconnects, [`Ibbq::disconnect`] and
//! cancellation of the upstream token all end up in the same teardown, which
//! runs once per connection: it stops the battery poller, clears the client
//! and only then tells the observer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument, Span};

use crate::ble::advertising::AdvertisementFilter;
use crate::ble::characteristics::{CharacteristicHandle, CharacteristicId, CharacteristicSet};
use crate::ble::gatt::{GattClient, GattConnector, NotificationHandler, WriteMode};
use crate::ble::scanner::BtleplugConnector;
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::observer::{EventDispatcher, SessionEvent, SessionObserver};
use crate::poller::BatteryPoller;
use crate::protocol::commands::{SettingCommand, CREDENTIALS};
use crate::protocol::notifications::{decode_real_time_data, decode_setting_result, hex};
use crate::status::{SessionState, Status};

/// Time the transport gets to report a requested disconnect before the
/// session tears itself down.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Builder for [`Ibbq`].
pub struct IbbqBuilder {
    connector: Arc<dyn GattConnector>,
    config: Configuration,
    observer: Arc<dyn SessionObserver>,
    cancel: CancellationToken,
    filter: AdvertisementFilter,
    span: Option<Span>,
}

impl IbbqBuilder {
    /// Set the configuration. Defaults to [`Configuration::default`].
    pub fn configuration(mut self, config: Configuration) -> Self {
        self.config = config;
        self
    }

    /// Set the observer. Defaults to [`crate::NoopObserver`].
    pub fn observer(mut self, observer: impl SessionObserver) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Tie the session to an upstream cancellation token.
    ///
    /// Cancelling it disconnects the thermometer the same way a device
    /// disconnect would.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Connect to devices accepted by `filter` instead of any iBBQ.
    pub fn filter(mut self, filter: AdvertisementFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Record the session's logs and tasks under `span`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the session.
    pub fn build(self) -> Ibbq {
        let span = self
            .span
            .unwrap_or_else(|| info_span!("ibbq", name = self.filter.local_name()));

        Ibbq {
            inner: Arc::new(Inner {
                config: self.config,
                connector: self.connector,
                filter: self.filter,
                observer: self.observer,
                // A child token lets dropping the session disconnect without
                // cancelling the caller's token.
                shutdown: self.cancel.child_token(),
                span,
                state: RwLock::new(SessionState::Idle),
                client: RwLock::new(None),
                characteristics: RwLock::new(None),
            }),
        }
    }
}

/// A session with one iBBQ thermometer.
///
/// # Example
///
/// ```rust,no_run
/// use ibbq_rust_ble::{Callbacks, Configuration, Ibbq, Result};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let cancel = CancellationToken::new();
///     let callbacks = Callbacks::new()
///         .with_temperature(|reading| println!("{:?}", reading.probes))
///         .with_battery(|battery| println!("battery {}%", battery.percent));
///
///     let ibbq = Ibbq::with_default_adapter(Configuration::default(), callbacks, cancel.clone()).await?;
///     ibbq.connect().await?;
///
///     tokio::signal::ctrl_c().await.ok();
///     cancel.cancel();
///     Ok(())
/// }
/// ```
pub struct Ibbq {
    inner: Arc<Inner>,
}

impl Ibbq {
    /// Start building a session on top of `connector`.
    pub fn builder(connector: Arc<dyn GattConnector>) -> IbbqBuilder {
        IbbqBuilder {
            connector,
            config: Configuration::default(),
            observer: Arc::new(crate::observer::NoopObserver),
            cancel: CancellationToken::new(),
            filter: AdvertisementFilter::ibbq(),
            span: None,
        }
    }

    /// Create a session.
    ///
    /// # Arguments
    ///
    /// * `connector` - Transport used to find and connect to the thermometer
    /// * `config` - Timeouts, polling and units
    /// * `observer` - Receives readings and status changes
    /// * `cancel` - Upstream cancellation, e.g. process shutdown
    pub fn new(
        connector: Arc<dyn GattConnector>,
        config: Configuration,
        observer: impl SessionObserver,
        cancel: CancellationToken,
    ) -> Self {
        Self::builder(connector)
            .configuration(config)
            .observer(observer)
            .cancellation(cancel)
            .build()
    }

    /// Create a session on the first Bluetooth adapter of this system.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn with_default_adapter(
        config: Configuration,
        observer: impl SessionObserver,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let connector = BtleplugConnector::default_adapter().await?;
        Ok(Self::new(Arc::new(connector), config, observer, cancel))
    }

    /// The session configuration.
    pub fn config(&self) -> &Configuration {
        &self.inner.config
    }

    /// Current internal state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Current externally visible status.
    pub fn status(&self) -> Status {
        self.state().status()
    }

    /// Check if connected and streaming.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Address of the connected device.
    pub fn address(&self) -> Option<String> {
        self.inner.client.read().as_ref().map(|client| client.address())
    }

    /// Connect to a thermometer and run the handshake.
    ///
    /// The whole sequence must finish within the configured connect timeout.
    /// A handshake failure leaves an established transport connection in
    /// place; call [`Ibbq::disconnect`] to drop it.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionFailed`] if the session is already connecting or
    ///   connected, or the transport could not connect
    /// - [`Error::Timeout`] if the deadline passed
    /// - [`Error::CharacteristicNotFound`] if the device lacks a required
    ///   characteristic
    /// - [`Error::NotConnected`] if the device disconnected mid-handshake
    /// - [`Error::Cancelled`] if the upstream token was cancelled first
    /// - transport errors from the failing handshake step
    ///
    /// Dropping the returned future abandons the attempt the same way a
    /// failure does, so the session can connect again.
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        inner.begin_connect()?;

        let link = Link::new(inner.observer.clone(), inner.span.clone());
        let mut attempt = ConnectAttempt {
            inner,
            link: link.clone(),
            finished: false,
        };
        link.events.send(SessionEvent::Status(Status::Connecting));

        let timeout = inner.config.connect_timeout();
        let establish = async {
            if timeout.is_zero() {
                return Err(Error::Timeout);
            }
            match tokio::time::timeout(timeout, inner.establish(&link)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout),
            }
        };

        let result = tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => Err(Error::Cancelled),
            result = establish.instrument(inner.span.clone()) => result,
        };

        match result.and_then(|()| inner.finish_connect(&link)) {
            Ok(()) => {
                attempt.finished = true;
                Ok(())
            }
            Err(e) => {
                let _enter = inner.span.enter();
                error!("Error received while connecting: {}", e);
                Err(e)
            }
        }
    }

    /// Ask the transport to disconnect.
    ///
    /// Returns once the request is accepted. The observer hears about the
    /// disconnect through the usual teardown, not from this call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if there is no live connection.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner
            .request_disconnect()
            .instrument(self.inner.span.clone())
            .await
    }

    /// The token that disconnects this session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }
}

impl Drop for Ibbq {
    fn drop(&mut self) {
        // Lets the upstream watcher disconnect a connection nobody owns anymore.
        self.inner.shutdown.cancel();
    }
}

impl std::fmt::Debug for Ibbq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ibbq")
            .field("state", &self.state())
            .field("address", &self.address())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Rolls back an unfinished connect, including one whose future was dropped.
struct ConnectAttempt<'a> {
    inner: &'a Inner,
    link: Arc<Link>,
    finished: bool,
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.abort_connect(&self.link);
        }
    }
}

/// Shared session state.
struct Inner {
    config: Configuration,
    connector: Arc<dyn GattConnector>,
    filter: AdvertisementFilter,
    observer: Arc<dyn SessionObserver>,
    /// Upstream cancellation, also cancelled when the session is dropped.
    shutdown: CancellationToken,
    span: Span,
    state: RwLock<SessionState>,
    /// Present only while connected.
    client: RwLock<Option<Arc<dyn GattClient>>>,
    /// Present only while connected and discovered.
    characteristics: RwLock<Option<CharacteristicSet>>,
}

/// Per-connection resources, torn down exactly once.
struct Link {
    /// Cancelled on teardown; stops watchers, poller and late notifications.
    token: CancellationToken,
    events: EventDispatcher,
    span: Span,
    torn_down: AtomicBool,
    has_client: AtomicBool,
    poller: Mutex<Option<BatteryPoller>>,
}

impl Link {
    fn new(observer: Arc<dyn SessionObserver>, span: Span) -> Arc<Self> {
        let (events, _dispatcher) = EventDispatcher::spawn(observer, span.clone());

        Arc::new(Self {
            token: CancellationToken::new(),
            events,
            span,
            torn_down: AtomicBool::new(false),
            has_client: AtomicBool::new(false),
            poller: Mutex::new(None),
        })
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn begin_connect(&self) -> Result<()> {
        let mut state = self.state.write();
        if !state.can_connect() {
            return Err(Error::ConnectionFailed {
                reason: format!("session is already {}", state.to_string().to_lowercase()),
            });
        }
        *state = SessionState::Connecting;
        Ok(())
    }

    fn set_state(&self, new_state: SessionState) {
        let old_state = std::mem::replace(&mut *self.state.write(), new_state);
        if old_state != new_state {
            debug!("Session state changed: {} -> {}", old_state, new_state);
        }
    }

    /// Acquire a client and run the handshake.
    async fn establish(self: &Arc<Self>, link: &Arc<Link>) -> Result<()> {
        info!("Connecting to device");
        let client = self.connector.connect(&self.filter).await?;
        info!(address = %client.address(), "Connected to device");

        *self.client.write() = Some(client.clone());
        link.has_client.store(true, Ordering::SeqCst);
        self.set_state(SessionState::Handshaking);

        debug!("Setting up disconnect handler");
        self.spawn_watchers(link, client.as_ref());

        self.discover_characteristics().await?;
        self.login().await?;
        self.subscribe_to_setting_results(link).await?;
        self.configure_temperature_units().await?;
        self.subscribe_to_real_time_data(link).await?;
        self.subscribe_to_history_data(link).await?;
        self.enable_real_time_data().await?;
        self.enable_battery_data(link).await?;

        Ok(())
    }

    fn finish_connect(&self, link: &Link) -> Result<()> {
        let mut state = self.state.write();
        if link.is_torn_down() {
            return Err(Error::NotConnected);
        }
        *state = SessionState::Streaming;
        link.events.send(SessionEvent::Status(Status::Connected));

        let _enter = self.span.enter();
        info!("Handshake complete, streaming");
        Ok(())
    }

    fn abort_connect(&self, link: &Link) {
        if link.has_client.load(Ordering::SeqCst) {
            // The watchers own the connection from here on.
            return;
        }

        let mut state = self.state.write();
        *state = SessionState::Disconnected;
        link.torn_down.store(true, Ordering::SeqCst);
        link.token.cancel();
        link.events.send(SessionEvent::Status(Status::Disconnected));
        link.events.send(SessionEvent::Closed);
    }

    fn spawn_watchers(self: &Arc<Self>, link: &Arc<Link>, client: &dyn GattClient) {
        let inner = self.clone();
        let watched = link.clone();
        let mut signal = client.disconnected();
        tokio::spawn(
            async move {
                debug!("Waiting for disconnect");
                tokio::select! {
                    _ = signal.fired() => inner.teardown(&watched).await,
                    _ = watched.token.cancelled() => {}
                }
            }
            .instrument(link.span.clone()),
        );

        let inner = self.clone();
        let watched = link.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = watched.token.cancelled() => return,
                }

                info!("Shutdown requested, disconnecting");
                if let Err(e) = inner.request_disconnect().await {
                    warn!("Disconnect request failed: {}", e);
                }

                tokio::select! {
                    _ = watched.token.cancelled() => {}
                    _ = tokio::time::sleep(SHUTDOWN_GRACE_PERIOD) => {
                        warn!("Transport did not report the disconnect, tearing down");
                        inner.teardown(&watched).await;
                    }
                }
            }
            .instrument(link.span.clone()),
        );
    }

    /// End a connection. Only the first call per link does anything.
    async fn teardown(&self, link: &Link) {
        if link
            .torn_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        link.token.cancel();

        let poller = link.poller.lock().take();
        if let Some(poller) = poller {
            poller.stop().await;
            debug!("Battery poller stopped");
        }

        let address = self.client.write().take().map(|client| client.address());
        self.characteristics.write().take();

        {
            let mut state = self.state.write();
            *state = SessionState::Disconnected;
            link.events.send(SessionEvent::Status(Status::Disconnected));
            link.events.send(SessionEvent::Disconnected);
        }

        info!(address = ?address, "Disconnected");
    }

    async fn request_disconnect(&self) -> Result<()> {
        let client = self.client()?;
        info!("Disconnecting");
        client.cancel_connection().await
    }

    fn client(&self) -> Result<Arc<dyn GattClient>> {
        self.client.read().clone().ok_or(Error::NotConnected)
    }

    /// Resolve a characteristic on the live connection.
    fn target(&self, id: CharacteristicId) -> Result<(Arc<dyn GattClient>, CharacteristicHandle)> {
        let client = self.client()?;
        let handle = self
            .characteristics
            .read()
            .as_ref()
            .ok_or(Error::NotConnected)?
            .get(id)?
            .clone();
        Ok((client, handle))
    }

    async fn write(&self, id: CharacteristicId, data: &[u8]) -> Result<()> {
        let (client, handle) = self.target(id)?;
        client
            .write_characteristic(&handle, data, WriteMode::WithResponse)
            .await
    }

    async fn write_setting(&self, command: SettingCommand) -> Result<()> {
        trace!("Writing setting: {}", command);
        self.write(CharacteristicId::SettingData, &command.to_bytes())
            .await
    }

    async fn subscribe(&self, id: CharacteristicId, handler: NotificationHandler) -> Result<()> {
        let (client, handle) = self.target(id)?;
        client.subscribe(&handle, handler).await
    }

    // === Handshake ===

    async fn discover_characteristics(&self) -> Result<()> {
        let client = self.client()?;
        let discovered = client.discover_characteristics().await?;
        let set = CharacteristicSet::from_discovered(discovered)?;

        if self.client.read().is_none() {
            return Err(Error::NotConnected);
        }
        *self.characteristics.write() = Some(set);
        Ok(())
    }

    async fn login(&self) -> Result<()> {
        debug!("Logging in to device");
        self.write(CharacteristicId::AccountAndVerify, &CREDENTIALS)
            .await?;
        debug!("Credentials written");
        Ok(())
    }

    async fn subscribe_to_setting_results(&self, link: &Arc<Link>) -> Result<()> {
        info!("Subscribing to setting results");
        let link = link.clone();
        let handler: NotificationHandler = Arc::new(move |data: Bytes| {
            if link.token.is_cancelled() {
                return;
            }
            let _enter = link.span.enter();
            debug!(data = %hex(&data), "Received setting result");

            match decode_setting_result(&data) {
                Ok(Some(battery)) => {
                    info!(
                        current_voltage = battery.current_voltage,
                        max_voltage = battery.max_voltage,
                        battery_pct = battery.percent,
                        "Battery data"
                    );
                    link.events.send(SessionEvent::Battery(battery));
                }
                Ok(None) => {}
                Err(e) => warn!("Dropping setting result: {}", e),
            }
        });

        self.subscribe(CharacteristicId::SettingResult, handler)
            .await
            .map_err(|e| {
                error!("Error subscribing to setting results: {}", e);
                e
            })?;
        info!("Subscribed to setting results");
        Ok(())
    }

    async fn configure_temperature_units(&self) -> Result<()> {
        let unit = self.config.temperature_unit();
        info!("Configuring temperature for {}", unit);
        self.write_setting(SettingCommand::SetUnits(unit)).await?;
        info!("Configured temperature for {}", unit);
        Ok(())
    }

    async fn subscribe_to_real_time_data(&self, link: &Arc<Link>) -> Result<()> {
        info!("Subscribing to real-time data");
        let link = link.clone();
        let handler: NotificationHandler = Arc::new(move |data: Bytes| {
            if link.token.is_cancelled() {
                return;
            }
            let _enter = link.span.enter();
            debug!(data = %hex(&data), "Received real-time data");

            match decode_real_time_data(&data) {
                Ok(reading) => {
                    debug!(probes = ?reading.probes, "Temperature received");
                    link.events.send(SessionEvent::Temperature(reading));
                }
                Err(e) => warn!("Dropping real-time data: {}", e),
            }
        });

        self.subscribe(CharacteristicId::RealTimeData, handler)
            .await
            .map_err(|e| {
                error!("Error subscribing to real-time data: {}", e);
                e
            })?;
        info!("Subscribed to real-time data");
        Ok(())
    }

    async fn subscribe_to_history_data(&self, link: &Arc<Link>) -> Result<()> {
        info!("Subscribing to history data");
        let link = link.clone();
        let handler: NotificationHandler = Arc::new(move |data: Bytes| {
            if link.token.is_cancelled() {
                return;
            }
            let _enter = link.span.enter();
            debug!(data = %hex(&data), "Received history data");
            link.events.send(SessionEvent::History(data));
        });

        self.subscribe(CharacteristicId::HistoryData, handler)
            .await
            .map_err(|e| {
                error!("Error subscribing to history data: {}", e);
                e
            })?;
        info!("Subscribed to history data");
        Ok(())
    }

    async fn enable_real_time_data(&self) -> Result<()> {
        info!("Enabling real-time data sending");
        self.write_setting(SettingCommand::EnableRealTimeData)
            .await?;
        info!("Enabled real-time data sending");
        Ok(())
    }

    async fn enable_battery_data(self: &Arc<Self>, link: &Link) -> Result<()> {
        info!("Enabling battery data sending");
        self.write_setting(SettingCommand::RequestBatteryLevel)
            .await?;
        info!("Enabled battery data sending");

        if !self.config.battery_polling_enabled() {
            debug!("Battery polling disabled");
            return Ok(());
        }

        let session: Weak<Inner> = Arc::downgrade(self);
        let poller = BatteryPoller::spawn(
            self.config.battery_polling_interval(),
            link.token.child_token(),
            move || {
                let session = session.upgrade();
                async move {
                    match session {
                        Some(session) => {
                            session
                                .write_setting(SettingCommand::RequestBatteryLevel)
                                .await
                        }
                        None => Err(Error::NotConnected),
                    }
                }
            },
            link.span.clone(),
        );
        *link.poller.lock() = Some(poller);

        Ok(())
    }
}

//! Observer interface and event dispatch.
//!
//! Notification handlers run on the transport's delivery path, so they only
//! decode and enqueue. A per-connection dispatcher task drains the queue and
//! invokes the observer one event at a time, in the order the events were
//! produced. A slow observer delays later callbacks but never the transport.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, Instrument, Span};

use crate::data::{BatteryReading, TemperatureReading};
use crate::status::Status;

/// Receives everything a session produces.
///
/// All methods default to doing nothing, so implementors only override what
/// they use. Methods are called from the session's dispatcher task, never
/// concurrently. Events queue up without limit while a method runs, so
/// methods should return quickly.
pub trait SessionObserver: Send + Sync + 'static {
    /// A real-time temperature frame was received.
    fn on_temperature(&self, _reading: &TemperatureReading) {}

    /// A battery frame was received.
    fn on_battery(&self, _reading: BatteryReading) {}

    /// The session status changed.
    fn on_status(&self, _status: Status) {}

    /// The connection ended. Called exactly once per established connection,
    /// after all readings of that connection.
    fn on_disconnected(&self) {}

    /// A raw history data frame was received.
    fn on_history_data(&self, _data: &[u8]) {}
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

impl<T: SessionObserver + ?Sized> SessionObserver for Arc<T> {
    fn on_temperature(&self, reading: &TemperatureReading) {
        (**self).on_temperature(reading);
    }

    fn on_battery(&self, reading: BatteryReading) {
        (**self).on_battery(reading);
    }

    fn on_status(&self, status: Status) {
        (**self).on_status(status);
    }

    fn on_disconnected(&self) {
        (**self).on_disconnected();
    }

    fn on_history_data(&self, data: &[u8]) {
        (**self).on_history_data(data);
    }
}

type TemperatureCallback = Box<dyn Fn(&TemperatureReading) + Send + Sync>;
type BatteryCallback = Box<dyn Fn(BatteryReading) + Send + Sync>;
type StatusCallback = Box<dyn Fn(Status) + Send + Sync>;
type DisconnectedCallback = Box<dyn Fn() + Send + Sync>;
type HistoryCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// A [`SessionObserver`] assembled from closures.
///
/// # Example
///
/// ```
/// use ibbq_rust_ble::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .with_temperature(|reading| println!("probes: {:?}", reading.probes))
///     .with_battery(|battery| println!("battery: {}%", battery.percent))
///     .with_disconnected(|| println!("disconnected"));
/// ```
#[derive(Default)]
pub struct Callbacks {
    temperature: Option<TemperatureCallback>,
    battery: Option<BatteryCallback>,
    status: Option<StatusCallback>,
    disconnected: Option<DisconnectedCallback>,
    history: Option<HistoryCallback>,
}

impl Callbacks {
    /// Create an empty set of callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the temperature callback.
    pub fn with_temperature<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TemperatureReading) + Send + Sync + 'static,
    {
        self.temperature = Some(Box::new(callback));
        self
    }

    /// Register the battery callback.
    pub fn with_battery<F>(mut self, callback: F) -> Self
    where
        F: Fn(BatteryReading) + Send + Sync + 'static,
    {
        self.battery = Some(Box::new(callback));
        self
    }

    /// Register the status callback.
    pub fn with_status<F>(mut self, callback: F) -> Self
    where
        F: Fn(Status) + Send + Sync + 'static,
    {
        self.status = Some(Box::new(callback));
        self
    }

    /// Register the disconnect callback.
    pub fn with_disconnected<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.disconnected = Some(Box::new(callback));
        self
    }

    /// Register the raw history data callback.
    pub fn with_history_data<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.history = Some(Box::new(callback));
        self
    }
}

impl SessionObserver for Callbacks {
    fn on_temperature(&self, reading: &TemperatureReading) {
        if let Some(callback) = &self.temperature {
            callback(reading);
        }
    }

    fn on_battery(&self, reading: BatteryReading) {
        if let Some(callback) = &self.battery {
            callback(reading);
        }
    }

    fn on_status(&self, status: Status) {
        if let Some(callback) = &self.status {
            callback(status);
        }
    }

    fn on_disconnected(&self) {
        if let Some(callback) = &self.disconnected {
            callback();
        }
    }

    fn on_history_data(&self, data: &[u8]) {
        if let Some(callback) = &self.history {
            callback(data);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("temperature", &self.temperature.is_some())
            .field("battery", &self.battery.is_some())
            .field("status", &self.status.is_some())
            .field("disconnected", &self.disconnected.is_some())
            .field("history", &self.history.is_some())
            .finish()
    }
}

/// Events queued for the observer.
#[derive(Debug, Clone)]
pub(crate) enum SessionEvent {
    Temperature(TemperatureReading),
    Battery(BatteryReading),
    History(Bytes),
    Status(Status),
    /// Final event of an established connection.
    Disconnected,
    /// Final event of an attempt that never got a connection.
    Closed,
}

impl SessionEvent {
    fn is_final(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Closed)
    }
}

/// Queue in front of the observer for one connection.
///
/// The queue is unbounded. Producers never wait on the observer, so an
/// observer that blocks makes the queue grow until it catches up or the
/// connection ends. Observers that do slow work should hand it off.
#[derive(Debug, Clone)]
pub(crate) struct EventDispatcher {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventDispatcher {
    /// Spawn the dispatcher task.
    ///
    /// The task ends after delivering a final event or when every dispatcher
    /// handle is dropped.
    pub(crate) fn spawn(observer: Arc<dyn SessionObserver>, span: Span) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();

        let handle = tokio::spawn(
            async move {
                while let Some(event) = rx.recv().await {
                    let is_final = event.is_final();
                    deliver(observer.as_ref(), event);
                    if is_final {
                        break;
                    }
                }
                debug!("Event dispatcher stopped");
            }
            .instrument(span),
        );

        (Self { tx }, handle)
    }

    /// Queue an event. Returns `false` once the dispatcher has stopped.
    pub(crate) fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

fn deliver(observer: &dyn SessionObserver, event: SessionEvent) {
    let result = catch_unwind(AssertUnwindSafe(|| match event {
        SessionEvent::Temperature(reading) => observer.on_temperature(&reading),
        SessionEvent::Battery(reading) => observer.on_battery(reading),
        SessionEvent::History(data) => observer.on_history_data(&data),
        SessionEvent::Status(status) => observer.on_status(status),
        SessionEvent::Disconnected => observer.on_disconnected(),
        SessionEvent::Closed => {}
    }));

    if result.is_err() {
        error!("Session observer panicked; continuing with the next event");
    }
}

//! Log thermometer readings until Ctrl+C or the device goes away.
//!
//! Run with: cargo run --example datalogger [c|f]
//!
//! Set `RUST_LOG=ibbq_rust_ble=debug` to see the handshake.

use std::sync::Arc;

use ibbq_rust_ble::{
    Callbacks, Configuration, Ibbq, Result, Status, TemperatureReading, TemperatureUnit,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let unit = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<TemperatureUnit>()?,
        None => TemperatureUnit::Celsius,
    };
    let config = Configuration::default().with_temperature_unit(unit);

    let disconnected = Arc::new(Notify::new());
    let done = disconnected.clone();

    let callbacks = Callbacks::new()
        .with_temperature(move |reading| log_temperatures(reading, unit))
        .with_battery(|battery| {
            info!(
                percent = battery.percent,
                voltage = battery.current_voltage,
                "Battery level"
            );
        })
        .with_status(|status| match status {
            Status::Connected => info!("Thermometer connected"),
            other => info!("Status: {}", other),
        })
        .with_disconnected(move || done.notify_one());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nExiting...");
            on_ctrl_c.cancel();
        }
    });

    let ibbq = Ibbq::with_default_adapter(config, callbacks, cancel.clone()).await?;

    println!("Looking for an iBBQ thermometer... Press Ctrl+C to exit.");
    if let Err(e) = ibbq.connect().await {
        warn!("Unable to connect: {}", e);
        // A connection may exist even though the handshake failed.
        let _ = ibbq.disconnect().await;
        return Err(e);
    }
    println!("Connected to {}", ibbq.address().unwrap_or_default());

    disconnected.notified().await;
    println!("Thermometer disconnected");

    Ok(())
}

fn log_temperatures(reading: &TemperatureReading, unit: TemperatureUnit) {
    let symbol = match unit {
        TemperatureUnit::Celsius => "°C",
        TemperatureUnit::Fahrenheit => "°F",
    };

    let probes: Vec<String> = reading
        .in_unit(unit)
        .iter()
        .enumerate()
        .map(|(i, t)| format!("P{}={:.1}{}", i + 1, t, symbol))
        .collect();

    info!("{}", probes.join(" "));
}

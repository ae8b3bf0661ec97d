//! Temperature unit conversions.

use crate::config::TemperatureUnit;

/// Convert Celsius to Fahrenheit.
///
/// ```
/// use ibbq_rust_ble::celsius_to_fahrenheit;
///
/// assert!((celsius_to_fahrenheit(21.5) - 70.7).abs() < 1e-9);
/// ```
#[inline]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert Fahrenheit to Celsius.
#[inline]
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Express a Celsius value in `unit`.
#[inline]
pub fn from_celsius(celsius: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius_to_fahrenheit(celsius),
    }
}

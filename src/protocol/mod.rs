//! Protocol module for the iBBQ wire formats.
//!
//! This module contains:
//! - Fixed command payloads and login credentials
//! - Notification frame decoding

pub mod commands;
pub mod notifications;

pub use commands::{SettingCommand, BATTERY_RESULT_TAG, CREDENTIALS};
pub use notifications::{decode_real_time_data, decode_setting_result};

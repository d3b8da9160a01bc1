//! Supported device classes
//!
//! The two firmware families speak different bauds and line formats but
//! share one bridge core; everything class-specific hangs off this enum.

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::decoder::{ArduinoDecoder, Esp32Decoder, FrameDecoder};

/// Device class attached to the serial port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    /// ESP32 firmware, JSON frames at 115200 baud
    Esp32,
    /// Arduino Uno firmware, mixed JSON/free-text frames at 9600 baud
    ArduinoUno,
}

impl DeviceClass {
    /// Fixed baud rate for this device class
    pub fn baud_rate(&self) -> u32 {
        match self {
            Self::Esp32 => 115_200,
            Self::ArduinoUno => 9_600,
        }
    }

    /// Default logical device identifier
    pub fn default_device_id(&self) -> &'static str {
        match self {
            Self::Esp32 => "ESP32-SOIL-001",
            Self::ArduinoUno => "ARDUINO-UNO-001",
        }
    }

    /// Fixed delay before a reopen attempt after a fault.
    ///
    /// Deliberately not exponential: the device link flaps on USB resets
    /// and firmware reboots, and a short constant delay recovers fastest.
    pub fn retry_delay(&self) -> Duration {
        match self {
            Self::Esp32 => Duration::from_secs(3),
            Self::ArduinoUno => Duration::from_secs(5),
        }
    }

    /// Frame decoder strategy for this class
    pub fn decoder(&self) -> Box<dyn FrameDecoder> {
        match self {
            Self::Esp32 => Box::new(Esp32Decoder),
            Self::ArduinoUno => Box::new(ArduinoDecoder),
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Esp32 => write!(f, "esp32"),
            Self::ArduinoUno => write!(f, "arduino-uno"),
        }
    }
}

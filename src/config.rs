//! Bridge configuration
//!
//! Layered loading: built-in defaults, then `config/soilbridge.yaml`,
//! then `SOILBRIDGE_*` environment variables (`__` separates nesting,
//! e.g. `SOILBRIDGE_SERIAL__PORT=/dev/ttyUSB0`).

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::device::DeviceClass;
use crate::error::{BridgeError, Result};

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    #[serde(default = "default_port")]
    pub port: String,

    /// Device class attached to the port; fixes the baud rate and the
    /// decoder strategy
    #[serde(default = "default_device_class")]
    pub device_class: DeviceClass,
}

/// Remote ingestion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the ingestion service
    #[serde(default = "default_api_url")]
    pub url: String,

    /// Pre-shared API key sent as X-API-Key; required
    #[serde(default)]
    pub key: String,
}

/// Top-level bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_serial")]
    pub serial: SerialConfig,

    #[serde(default = "default_api")]
    pub api: ApiConfig,

    /// Logical device identifier injected into every payload; defaults
    /// per device class when unset
    #[serde(default)]
    pub device_id: Option<String>,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_device_class() -> DeviceClass {
    DeviceClass::Esp32
}

fn default_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_serial() -> SerialConfig {
    SerialConfig {
        port: default_port(),
        device_class: default_device_class(),
    }
}

fn default_api() -> ApiConfig {
    ApiConfig {
        url: default_api_url(),
        key: String::new(),
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial: default_serial(),
            api: default_api(),
            device_id: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from defaults, YAML file, and environment
    pub fn load() -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file("config/soilbridge.yaml"))
            .merge(Env::prefixed("SOILBRIDGE_").split("__"))
            .extract()
            .map_err(|e| BridgeError::config(format!("Failed to load configuration: {}", e)))?;

        Ok(config)
    }

    /// Validate startup requirements.
    ///
    /// A missing API key is fatal: without the shared secret every
    /// delivery would be rejected, so the process refuses to start.
    pub fn validate(&self) -> Result<()> {
        if self.api.key.trim().is_empty() {
            return Err(BridgeError::config(
                "api.key is not set (SOILBRIDGE_API__KEY); refusing to start",
            ));
        }
        if self.serial.port.trim().is_empty() {
            return Err(BridgeError::config("serial.port must not be empty"));
        }
        if self.api.url.trim().is_empty() {
            return Err(BridgeError::config("api.url must not be empty"));
        }
        Ok(())
    }

    /// Effective device identifier (explicit or class default)
    pub fn device_id(&self) -> String {
        self.device_id
            .clone()
            .unwrap_or_else(|| self.serial.device_class.default_device_id().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.device_class, DeviceClass::Esp32);
        assert_eq!(config.api.url, "http://localhost:3000");
        assert_eq!(config.device_id(), "ESP32-SOIL-001");
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.api.key = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_id_override() {
        let mut config = BridgeConfig::default();
        assert_eq!(config.device_id(), "ESP32-SOIL-001");

        config.serial.device_class = DeviceClass::ArduinoUno;
        assert_eq!(config.device_id(), "ARDUINO-UNO-001");

        config.device_id = Some("GREENHOUSE-07".to_string());
        assert_eq!(config.device_id(), "GREENHOUSE-07");
    }
}

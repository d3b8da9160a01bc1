//! Soil moisture serial bridge
//!
//! A headless forwarding agent: reads line-oriented telemetry from one
//! soil moisture sensor over a serial link, extracts readings from the
//! device's mixed line formats, validates them, and posts each accepted
//! reading to a remote ingestion endpoint over HTTP.
//!
//! The pipeline is event-driven and single-writer: the connection
//! supervisor owns all link state and is the only component that reacts
//! to device faults, while decoding and validation stay pure and uplink
//! deliveries run as independent tasks.

pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod model;
pub mod source;
pub mod supervisor;
pub mod uplink;
pub mod validate;

pub use config::BridgeConfig;
pub use device::DeviceClass;
pub use error::{BridgeError, Result};
pub use model::{CanonicalPayload, ConnectionState, DecodedFrame, SourceEvent, UplinkOutcome};
pub use supervisor::ConnectionSupervisor;

//! HTTP uplink to the remote ingestion endpoint
//!
//! Each payload is delivered at most once: a failed delivery is logged
//! with whatever detail the server provided and then dropped. Loss of
//! readings during endpoint outages is an accepted limitation; there is
//! no local durable queue.

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::model::{CanonicalPayload, UplinkOutcome};

const API_KEY_HEADER: &str = "X-API-Key";

/// Client for the soil reading ingestion endpoint
#[derive(Debug, Clone)]
pub struct UplinkClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl UplinkClient {
    /// Create a client for `{api_url}/api/iot/soil`
    pub fn new(api_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/api/iot/soil", api_url.trim_end_matches('/')),
            api_key: api_key.into(),
        }
    }

    /// Deliver one payload and interpret the response.
    ///
    /// HTTP failure statuses are reported through the outcome, not as
    /// errors; only network-level failures surface as `Err`, and the
    /// caller logs both identically. Never affects the device link state.
    pub async fn send(&self, payload: &CanonicalPayload) -> Result<UplinkOutcome> {
        debug!("Posting reading to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        // Both success and failure bodies are JSON objects; a body that
        // fails to parse is treated as absent detail, not an error.
        let body: Option<Value> = response.json().await.ok();

        if status.is_success() {
            let record_id = body
                .as_ref()
                .and_then(|b| b.get("data"))
                .and_then(|d| d.get("id"))
                .map(|id| match id.as_str() {
                    Some(s) => s.to_string(),
                    None => id.to_string(),
                });

            Ok(UplinkOutcome {
                accepted: true,
                http_status: status.as_u16(),
                record_id,
                ..Default::default()
            })
        } else {
            let server_message = body
                .as_ref()
                .and_then(|b| b.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let validation_errors = body
                .as_ref()
                .and_then(|b| b.get("errors"))
                .and_then(Value::as_array)
                .map(|errs| {
                    errs.iter()
                        .map(|e| match e.as_str() {
                            Some(s) => s.to_string(),
                            None => e.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            Ok(UplinkOutcome {
                accepted: false,
                http_status: status.as_u16(),
                server_message,
                validation_errors,
                ..Default::default()
            })
        }
    }
}

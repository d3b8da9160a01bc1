//! Connection supervisor
//!
//! Single owner of the device link state machine. The line source reports
//! lifecycle and data events over an mpsc channel; the supervisor reacts
//! to faults by scheduling one reopen attempt after a fixed delay, feeds
//! decoded readings through validation, and dispatches each accepted
//! payload as an independent uplink task. No other component mutates
//! connection state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::decoder::FrameDecoder;
use crate::model::{CanonicalPayload, ConnectionState, DecodedFrame, SourceEvent};
use crate::source::LineSource;
use crate::uplink::UplinkClient;
use crate::validate::normalize_reading;

/// Interval between liveness notices while the link is open
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(30);

const EVENT_QUEUE_DEPTH: usize = 64;

/// Drives the line source lifecycle and the per-line pipeline
pub struct ConnectionSupervisor<S: LineSource> {
    source: S,
    decoder: Box<dyn FrameDecoder>,
    uplink: Arc<UplinkClient>,
    device_id: String,
    retry_delay: Duration,
    state: ConnectionState,
    /// Deadline of the single scheduled reopen attempt, if any
    retry_at: Option<Instant>,
}

impl<S: LineSource> ConnectionSupervisor<S> {
    pub fn new(
        source: S,
        decoder: Box<dyn FrameDecoder>,
        uplink: Arc<UplinkClient>,
        device_id: impl Into<String>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            source,
            decoder,
            uplink,
            device_id: device_id.into(),
            retry_delay,
            state: ConnectionState::Closed,
            retry_at: None,
        }
    }

    /// Run until cancelled. Keeps retrying the device link indefinitely;
    /// on cancellation an open link is closed cleanly, while in-flight
    /// uplink tasks are left to finish on their own.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let mut liveness = interval(LIVENESS_INTERVAL);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick completes immediately; swallow it so
        // the first notice fires one full period after startup.
        liveness.tick().await;

        self.transition(ConnectionState::Opening);
        self.source.open(tx.clone()).await;

        loop {
            let retry_deadline = self.retry_at.unwrap_or_else(Instant::now);

            tokio::select! {
                () = shutdown.cancelled() => {
                    if self.state == ConnectionState::Open {
                        self.source.close().await;
                    }
                    info!("Connection supervisor stopped");
                    return;
                }
                _ = liveness.tick() => {
                    if self.state == ConnectionState::Open {
                        info!("Bridge active - device {} link open", self.device_id);
                    }
                }
                () = sleep_until(retry_deadline), if self.retry_at.is_some() => {
                    self.retry_at = None;
                    self.transition(ConnectionState::Opening);
                    self.source.open(tx.clone()).await;
                }
                event = rx.recv() => {
                    // The loop holds a sender, so recv never yields None
                    if let Some(event) = event {
                        self.handle_event(event).await;
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Opened => {
                self.transition(ConnectionState::Open);
                info!("Device link established; waiting for soil moisture data");
            }
            SourceEvent::Line(line) => {
                if self.state == ConnectionState::Open {
                    self.handle_line(&line);
                } else {
                    debug!("Ignoring line while {:?}: {}", self.state, line);
                }
            }
            SourceEvent::Error(reason) => {
                warn!("Device link error: {}", reason);
                self.fault().await;
            }
            SourceEvent::Closed => {
                if self.state == ConnectionState::Open {
                    warn!("Device link closed unexpectedly");
                    self.fault().await;
                }
            }
        }
    }

    /// Enter `Faulted` and schedule exactly one reopen attempt
    async fn fault(&mut self) {
        self.source.close().await;
        self.transition(ConnectionState::Faulted);
        if self.retry_at.is_none() {
            self.retry_at = Some(Instant::now() + self.retry_delay);
            info!("Reconnect attempt scheduled in {:?}", self.retry_delay);
        }
    }

    /// One logical unit of work: decode, validate, dispatch
    fn handle_line(&self, line: &str) {
        match self.decoder.decode(line) {
            DecodedFrame::Reading(frame) => {
                debug!("Decoded reading: {:?}", frame);
                if let Some(payload) = normalize_reading(&frame, &self.device_id) {
                    self.dispatch(payload);
                }
            }
            DecodedFrame::StatusNotice { status } => {
                info!("Device status: {}", status);
            }
            DecodedFrame::InfoNotice => {
                debug!("Device info: {}", line);
            }
            DecodedFrame::Unrecognized => {
                debug!("No data extracted from line: {}", line);
            }
        }
    }

    /// Spawn one delivery task per payload. A slow endpoint must not
    /// block decoding of subsequent lines; deliveries carry no ordering
    /// guarantee.
    fn dispatch(&self, payload: CanonicalPayload) {
        let uplink = Arc::clone(&self.uplink);
        tokio::spawn(async move {
            match uplink.send(&payload).await {
                Ok(outcome) if outcome.accepted => {
                    info!(
                        "Reading saved: moisture={}%{}",
                        payload.moisture,
                        outcome
                            .record_id
                            .map(|id| format!(" id={}", id))
                            .unwrap_or_default()
                    );
                }
                Ok(outcome) => {
                    warn!(
                        "Uplink rejected reading (HTTP {}): {}",
                        outcome.http_status,
                        outcome.server_message.as_deref().unwrap_or("unknown error")
                    );
                    for detail in &outcome.validation_errors {
                        warn!("  {}", detail);
                    }
                }
                Err(e) => {
                    warn!("Failed to deliver reading: {}", e);
                }
            }
        });
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("Connection state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

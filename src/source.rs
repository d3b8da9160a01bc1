//! Serial line source
//!
//! Owns the physical connection to one device and turns its byte stream
//! into trimmed, newline-delimited lines. All lifecycle outcomes (opened,
//! line received, error, closed) are reported as events on a channel;
//! nothing here decides retry policy — that belongs to the supervisor.

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::SourceEvent;

/// A source of raw device lines reporting through a `SourceEvent` channel
#[async_trait]
pub trait LineSource: Send {
    /// Attempt to acquire the device. Emits `Opened` on success or
    /// `Error` with a diagnostic reason on failure; never returns the
    /// failure directly.
    async fn open(&mut self, events: mpsc::Sender<SourceEvent>);

    /// Release the device. Idempotent: closing an already-closed source
    /// is a no-op.
    async fn close(&mut self);
}

struct ReaderHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Line source backed by a physical serial port
pub struct SerialLineSource {
    path: String,
    baud_rate: u32,
    reader: Option<ReaderHandle>,
}

impl SerialLineSource {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            reader: None,
        }
    }
}

#[async_trait]
impl LineSource for SerialLineSource {
    async fn open(&mut self, events: mpsc::Sender<SourceEvent>) {
        if self.reader.is_some() {
            debug!("Serial port {} already open", self.path);
            return;
        }

        match tokio_serial::new(&self.path, self.baud_rate).open_native_async() {
            Ok(mut port) => {
                #[cfg(unix)]
                if let Err(e) = port.set_exclusive(false) {
                    warn!("Failed to clear exclusive mode on {}: {}", self.path, e);
                }
                self.spawn_reader(port, events).await;
            }
            Err(e) => {
                let reason = format!("Failed to open serial port {}: {}", self.path, e);
                let _ = events.send(SourceEvent::Error(reason)).await;
            }
        }
    }

    async fn close(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.cancel.cancel();
            let _ = handle.task.await;
            info!("Closed serial port: {}", self.path);
        }
    }
}

impl SerialLineSource {
    async fn spawn_reader(
        &mut self,
        port: tokio_serial::SerialStream,
        events: mpsc::Sender<SourceEvent>,
    ) {
        info!(
            "Opened serial port {} at {} baud",
            self.path, self.baud_rate
        );
        let _ = events.send(SourceEvent::Opened).await;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_lines(port, events, cancel.clone()));
        self.reader = Some(ReaderHandle { cancel, task });
    }
}

/// Newline-delimited decoder that drops an un-terminated tail.
///
/// `LinesCodec` on its own flushes whatever is left in the buffer as a
/// final frame when the stream ends; a mid-line disconnect would then
/// surface the partial fragment as data. Lines are only ever emitted
/// complete, so end-of-stream discards the remainder instead.
struct DiscardingLineDecoder(LinesCodec);

impl DiscardingLineDecoder {
    fn new() -> Self {
        Self(LinesCodec::new())
    }
}

impl Decoder for DiscardingLineDecoder {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        self.0.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        let frame = self.0.decode(src)?;
        if frame.is_none() {
            // Partial trailing data at end of stream, never a full line
            src.clear();
        }
        Ok(frame)
    }
}

/// Pump complete lines from the port into the event channel.
///
/// Every send is raced against the cancellation token: close() must be
/// able to stop the reader even when the event channel is full.
async fn read_lines<R>(port: R, events: mpsc::Sender<SourceEvent>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(port, DiscardingLineDecoder::new());

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            item = lines.next() => {
                let event = match item {
                    Some(Ok(line)) => SourceEvent::Line(line.trim().to_string()),
                    Some(Err(e)) => SourceEvent::Error(format!("Serial read failed: {}", e)),
                    None => SourceEvent::Closed,
                };
                let terminal = !matches!(event, SourceEvent::Line(_));
                if !send_or_cancelled(&events, &cancel, event).await || terminal {
                    break;
                }
            }
        }
    }
}

/// Deliver one event unless cancellation wins the race first.
/// Returns false when the reader should stop.
async fn send_or_cancelled(
    events: &mpsc::Sender<SourceEvent>,
    cancel: &CancellationToken,
    event: SourceEvent,
) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        result = events.send(event) => result.is_ok(),
    }
}

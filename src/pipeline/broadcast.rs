use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, instrument, warn};

use super::SharedCoordinator;
use crate::capture::{FrameData, NO_SEQUENCE};
use crate::wire::{depth, jpeg, FrameKind};
use crate::Result;

/// One outgoing message for a frame consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Binary(Bytes),
}

/// Destination for broadcast output. Implementations must not block for long;
/// a slow sink delays every other sink.
pub trait FrameSink: Send {
    fn send(&mut self, message: Outbound) -> Result<()>;
}

impl FrameSink for flume::Sender<Outbound> {
    fn send(&mut self, message: Outbound) -> Result<()> {
        // A full or disconnected consumer just misses the frame.
        if let Err(e) = self.try_send(message) {
            tracing::trace!("Sink dropped message: {}", e);
        }
        Ok(())
    }
}

/// Non-blocking reader of both frame slots that fans new frames out to sinks.
pub struct BroadcastLoop {
    coordinator: Arc<SharedCoordinator>,
    sinks: Vec<Box<dyn FrameSink>>,
    running: Arc<AtomicBool>,
    interval: Duration,
    jpeg_quality: u8,
    last_raw: i64,
    last_depth: i64,
}

impl BroadcastLoop {
    pub fn new(
        coordinator: Arc<SharedCoordinator>,
        sinks: Vec<Box<dyn FrameSink>>,
        running: Arc<AtomicBool>,
        interval: Duration,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            coordinator,
            sinks,
            running,
            interval,
            jpeg_quality,
            last_raw: NO_SEQUENCE,
            last_depth: NO_SEQUENCE,
        }
    }

    /// Last raw and depth sequence IDs sent.
    pub fn last_sent(&self) -> (i64, i64) {
        (self.last_raw, self.last_depth)
    }

    /// Publish whichever slots changed since the previous step. Returns the
    /// number of messages handed to each sink.
    pub fn step(&mut self) -> usize {
        let mut outgoing = Vec::new();

        let raw = self.coordinator.frame();
        if is_unsent(&raw, self.last_raw) {
            self.last_raw = raw.sequence_id;
            self.encode_preview(FrameKind::Raw, &raw, &mut outgoing);
        }

        let derived = self.coordinator.depth_frame();
        if is_unsent(&derived, self.last_depth) {
            self.last_depth = derived.sequence_id;
            self.encode_preview(FrameKind::Depth, &derived, &mut outgoing);
            if let Some(packet) = depth::encode(&derived) {
                outgoing.push(Outbound::Binary(packet));
            }
        }

        for message in &outgoing {
            for sink in self.sinks.iter_mut() {
                if let Err(e) = sink.send(message.clone()) {
                    warn!("Broadcast sink failed: {}", e);
                }
            }
        }
        outgoing.len()
    }

    fn encode_preview(&self, kind: FrameKind, frame: &FrameData, out: &mut Vec<Outbound>) {
        let encoded = jpeg::frame_update(kind, frame, self.jpeg_quality)
            .and_then(|msg| msg.map(|m| m.to_json()).transpose());
        match encoded {
            Ok(Some(text)) => out.push(Outbound::Text(text)),
            Ok(None) => {}
            Err(e) => warn!(sequence = frame.sequence_id, ?kind, "Failed to encode frame: {}", e),
        }
    }

    #[instrument(name = "broadcast_loop", skip(self), fields(sinks = self.sinks.len()))]
    pub fn run(mut self) {
        info!("Broadcast worker started");
        while self.running.load(Ordering::Acquire) {
            self.step();
            thread::sleep(self.interval);
        }
        info!(raw = self.last_raw, depth = self.last_depth, "Broadcast worker exiting");
    }
}

fn is_unsent(frame: &FrameData, last_sent: i64) -> bool {
    !frame.is_empty() && frame.sequence_id > last_sent
}

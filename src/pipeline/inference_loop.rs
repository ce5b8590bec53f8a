use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, instrument};

use super::SharedCoordinator;
use crate::capture::NO_SEQUENCE;
use crate::inference::DepthEngine;

/// Outcome of one inference iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Inferencing flag is off; nothing was waited on.
    Disabled,
    /// The wait returned an empty frame.
    Empty,
    /// The engine rejected the frame; nothing was published.
    Invalid(i64),
    Published(i64),
}

/// Blocking consumer of raw frames, producer of depth frames.
pub struct InferenceLoop {
    coordinator: Arc<SharedCoordinator>,
    engine: Box<dyn DepthEngine>,
    running: Arc<AtomicBool>,
    idle_poll: Duration,
    last_processed: i64,
}

impl InferenceLoop {
    pub fn new(
        coordinator: Arc<SharedCoordinator>,
        engine: Box<dyn DepthEngine>,
        running: Arc<AtomicBool>,
        idle_poll: Duration,
    ) -> Self {
        Self {
            coordinator,
            engine,
            running,
            idle_poll,
            last_processed: NO_SEQUENCE,
        }
    }

    pub fn last_processed(&self) -> i64 {
        self.last_processed
    }

    pub fn step(&mut self) -> Step {
        if !self.coordinator.is_inferencing() {
            return Step::Disabled;
        }

        let frame = self.coordinator.wait_for_new_frame(self.last_processed);
        let Some(image) = frame.image.as_deref() else {
            return Step::Empty;
        };

        let result = self.engine.predict(image);
        self.coordinator.set_inference_time(result.infer_time_ms);
        metrics::histogram!("depthcast_inference_ms").record(result.infer_time_ms);
        self.last_processed = frame.sequence_id;

        if !result.is_valid {
            debug!(sequence = frame.sequence_id, "Engine returned no depth");
            return Step::Invalid(frame.sequence_id);
        }
        self.coordinator.set_depth_frame(result.into_frame(&frame));
        Step::Published(frame.sequence_id)
    }

    #[instrument(name = "inference_loop", skip(self), fields(engine = self.engine.name()))]
    pub fn run(mut self) {
        info!("Inference worker started");
        while self.running.load(Ordering::Acquire) {
            match self.step() {
                Step::Disabled => thread::sleep(self.idle_poll),
                // Without mapping the wait returns at once; poll instead of spinning.
                Step::Empty if !self.coordinator.is_mapping() => thread::sleep(self.idle_poll),
                _ => {}
            }
        }
        info!(last = self.last_processed, "Inference worker exiting");
    }
}

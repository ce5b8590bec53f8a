use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use super::SharedCoordinator;
use crate::capture::{FrameData, ScreenGrabber, MAX_FPS};

/// Frame period at `fps` in whole milliseconds; never shorter than 1ms.
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(fps.clamp(1, MAX_FPS)))
}

/// Time left in this tick's budget; zero once the work overran it.
pub fn remaining_budget(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Time-paced producer that owns the raw-frame sequence counter.
pub struct CaptureLoop {
    coordinator: Arc<SharedCoordinator>,
    grabber: ScreenGrabber,
    running: Arc<AtomicBool>,
    frame_id: i64,
}

impl CaptureLoop {
    /// The sequence counter resumes after whatever the coordinator already
    /// holds, so a restarted loop is not rejected by the non-regression rule.
    pub fn new(
        coordinator: Arc<SharedCoordinator>,
        grabber: ScreenGrabber,
        running: Arc<AtomicBool>,
    ) -> Self {
        let frame_id = coordinator.frame().sequence_id.max(0);
        Self {
            coordinator,
            grabber,
            running,
            frame_id,
        }
    }

    /// Last sequence number handed out.
    pub fn frame_id(&self) -> i64 {
        self.frame_id
    }

    /// One capture iteration. Returns how long to sleep before the next.
    pub fn tick(&mut self) -> Duration {
        let fps = self.coordinator.config().effective_fps();
        let interval = frame_interval(fps);

        let start = Instant::now();
        if let Some(image) = self.grabber.grab() {
            let duration = start.elapsed();
            self.frame_id += 1;
            let frame = FrameData::captured(image, self.frame_id, duration);

            self.coordinator.set_capture_time(frame.duration_ms);
            metrics::histogram!("depthcast_capture_ms").record(frame.duration_ms);
            self.coordinator.set_frame(frame);
        }

        remaining_budget(interval, start.elapsed())
    }

    #[instrument(name = "capture_loop", skip(self))]
    pub fn run(mut self) {
        info!("Capture worker started");
        while self.running.load(Ordering::Acquire) {
            let pause = self.tick();
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }
        info!(frames = self.frame_id, "Capture worker exiting");
    }
}

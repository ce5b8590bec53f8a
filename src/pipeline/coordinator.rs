//! Shared data-exchange hub between the capture, inference and broadcast loops.
//!
//! One mutex guards the configuration and both frame slots. The run-state
//! flags and counters are atomics so hot-path readers never take the lock;
//! flag writers still store under the mutex so a waiter can not miss a toggle
//! between checking its predicate and parking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::capture::{CaptureConfig, FrameData, WindowSource};

struct Slots {
    config: CaptureConfig,
    frame: FrameData,
    depth_frame: FrameData,
    /// Bumped on every run-state flag write so parked waiters can tell a
    /// toggle from a spurious wake.
    flag_epoch: u64,
}

/// Point-in-time view of the informational counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub capture_ms: f64,
    pub inference_ms: f64,
    pub config_version: u64,
    pub frame_sequence: i64,
    pub depth_sequence: i64,
}

pub struct SharedCoordinator {
    source: Arc<dyn WindowSource>,
    slots: Mutex<Slots>,
    /// Signaled on every raw-frame publish and every run-state flag change.
    frame_arrived: Condvar,
    config_version: CachePadded<AtomicU64>,
    mapping: AtomicBool,
    inferencing: AtomicBool,
    last_capture_ms: CachePadded<AtomicU64>,
    last_inference_ms: CachePadded<AtomicU64>,
}

fn is_newer(frame: &FrameData, last_seen: i64) -> bool {
    !frame.is_empty() && frame.sequence_id > last_seen
}

impl SharedCoordinator {
    /// Coordinator holding the default configuration, unresolved, at version 0.
    pub fn new(source: Arc<dyn WindowSource>) -> Self {
        Self {
            source,
            slots: Mutex::new(Slots {
                config: CaptureConfig::default(),
                frame: FrameData::default(),
                depth_frame: FrameData::default(),
                flag_epoch: 0,
            }),
            frame_arrived: Condvar::new(),
            config_version: CachePadded::new(AtomicU64::new(0)),
            mapping: AtomicBool::new(false),
            inferencing: AtomicBool::new(false),
            last_capture_ms: CachePadded::new(AtomicU64::new(0f64.to_bits())),
            last_inference_ms: CachePadded::new(AtomicU64::new(0f64.to_bits())),
        }
    }

    pub fn window_source(&self) -> &Arc<dyn WindowSource> {
        &self.source
    }

    pub fn config(&self) -> CaptureConfig {
        self.slots.lock().config.clone()
    }

    /// Resolve the window title and install `config` if it differs from the
    /// current one. Returns whether anything changed.
    ///
    /// The comparison, write and version bump share one critical section.
    pub fn set_config(&self, mut config: CaptureConfig) -> bool {
        config.target = self.source.find(&config.window_name);

        let version = {
            let mut slots = self.slots.lock();
            if slots.config == config {
                return false;
            }
            slots.config = config.clone();
            self.config_version.fetch_add(1, Ordering::AcqRel) + 1
        };
        metrics::counter!("depthcast_config_version_bumps").increment(1);

        match config.target {
            Some(target) => info!(
                window = %config.window_name,
                %target,
                method = ?config.method,
                fps = config.fps,
                version,
                "Capture config updated, window matched"
            ),
            None => warn!(
                window = %config.window_name,
                method = ?config.method,
                version,
                "Capture config updated, window not found"
            ),
        }
        true
    }

    /// Lock-free; cheap enough to poll every capture tick.
    pub fn config_version(&self) -> u64 {
        self.config_version.load(Ordering::Acquire)
    }

    /// Publish a raw frame unless it would move the sequence backwards.
    ///
    /// Waiters are woken outside the lock either way.
    pub fn set_frame(&self, frame: FrameData) -> bool {
        let accepted = {
            let mut slots = self.slots.lock();
            if frame.sequence_id > slots.frame.sequence_id {
                slots.frame = frame;
                true
            } else {
                debug!(
                    incoming = frame.sequence_id,
                    current = slots.frame.sequence_id,
                    "Discarding stale frame"
                );
                false
            }
        };
        if accepted {
            metrics::counter!("depthcast_frames_published").increment(1);
        } else {
            metrics::counter!("depthcast_frames_rejected").increment(1);
        }
        self.frame_arrived.notify_all();
        accepted
    }

    pub fn frame(&self) -> FrameData {
        self.slots.lock().frame.clone()
    }

    /// Block until a non-empty frame newer than `last_seen` exists, mapping
    /// is off, or either run-state flag is written.
    ///
    /// Returns an empty frame when inferencing is off at wake-up, and when
    /// woken by the mapping flag without a qualifying frame.
    pub fn wait_for_new_frame(&self, last_seen: i64) -> FrameData {
        let mut slots = self.slots.lock();
        let entry_epoch = slots.flag_epoch;
        self.frame_arrived.wait_while(&mut slots, |slots| {
            !is_newer(&slots.frame, last_seen)
                && self.mapping.load(Ordering::Acquire)
                && slots.flag_epoch == entry_epoch
        });

        if !self.inferencing.load(Ordering::Acquire) {
            return FrameData::default();
        }
        if is_newer(&slots.frame, last_seen) {
            slots.frame.clone()
        } else {
            FrameData::default()
        }
    }

    /// Always overwrites; derived frames inherit ordering from their source.
    pub fn set_depth_frame(&self, frame: FrameData) {
        self.slots.lock().depth_frame = frame;
    }

    pub fn depth_frame(&self) -> FrameData {
        self.slots.lock().depth_frame.clone()
    }

    pub fn is_mapping(&self) -> bool {
        self.mapping.load(Ordering::Acquire)
    }

    pub fn set_mapping(&self, state: bool) {
        self.set_flag(&self.mapping, state);
    }

    pub fn is_inferencing(&self) -> bool {
        self.inferencing.load(Ordering::Acquire)
    }

    /// Wakes every waiter even though this flag is not part of the wait
    /// predicate.
    pub fn set_inferencing(&self, state: bool) {
        self.set_flag(&self.inferencing, state);
    }

    fn set_flag(&self, flag: &AtomicBool, state: bool) {
        {
            let mut slots = self.slots.lock();
            flag.store(state, Ordering::Release);
            slots.flag_epoch = slots.flag_epoch.wrapping_add(1);
        }
        self.frame_arrived.notify_all();
    }

    pub fn set_capture_time(&self, ms: f64) {
        self.last_capture_ms.store(ms.to_bits(), Ordering::Relaxed);
    }

    pub fn capture_time(&self) -> f64 {
        f64::from_bits(self.last_capture_ms.load(Ordering::Relaxed))
    }

    pub fn set_inference_time(&self, ms: f64) {
        self.last_inference_ms.store(ms.to_bits(), Ordering::Relaxed);
    }

    pub fn inference_time(&self) -> f64 {
        f64::from_bits(self.last_inference_ms.load(Ordering::Relaxed))
    }

    pub fn telemetry(&self) -> Telemetry {
        let (frame_sequence, depth_sequence) = {
            let slots = self.slots.lock();
            (slots.frame.sequence_id, slots.depth_frame.sequence_id)
        };
        Telemetry {
            capture_ms: self.capture_time(),
            inference_ms: self.inference_time(),
            config_version: self.config_version(),
            frame_sequence,
            depth_sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use image::RgbImage;

    use crate::capture::{CaptureMethod, SyntheticWindows, NO_SEQUENCE};

    fn coordinator() -> (Arc<SharedCoordinator>, Arc<SyntheticWindows>) {
        let windows = Arc::new(SyntheticWindows::new());
        (Arc::new(SharedCoordinator::new(windows.clone())), windows)
    }

    fn frame(sequence_id: i64) -> FrameData {
        FrameData::captured(RgbImage::new(2, 2), sequence_id, Duration::ZERO)
    }

    /// Run `f` on a thread and fail the test if it does not finish in time.
    fn within<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        let (tx, rx) = flume::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(f());
        });
        rx.recv_timeout(Duration::from_secs(5))
            .expect("blocked call was never released")
    }

    #[test]
    fn out_of_order_frames_never_regress() {
        let (ctx, _) = coordinator();
        assert!(ctx.set_frame(frame(1)));
        assert!(ctx.set_frame(frame(2)));
        assert!(!ctx.set_frame(frame(1)));
        assert_eq!(ctx.frame().sequence_id, 2);
    }

    #[test]
    fn stale_frame_leaves_state_untouched() {
        let (ctx, _) = coordinator();
        ctx.set_frame(frame(5));
        let before = ctx.frame();
        ctx.set_frame(frame(5));
        ctx.set_frame(frame(3));
        let after = ctx.frame();
        assert!(Arc::ptr_eq(before.image.as_ref().unwrap(), after.image.as_ref().unwrap()));
    }

    #[test]
    fn concurrent_publishers_keep_the_maximum() {
        let (ctx, _) = coordinator();
        let handles: Vec<_> = (0..4)
            .map(|offset| {
                let ctx = ctx.clone();
                thread::spawn(move || {
                    let mut last = NO_SEQUENCE;
                    for i in 0..200 {
                        ctx.set_frame(frame(i * 4 + offset));
                        let seen = ctx.frame().sequence_id;
                        assert!(seen >= last);
                        last = seen;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ctx.frame().sequence_id, 199 * 4 + 3);
    }

    #[test]
    fn equal_config_bumps_version_once() {
        let (ctx, _) = coordinator();
        let config = CaptureConfig::new(CaptureMethod::Compat, "X", 30);
        let start = ctx.config_version();
        assert!(ctx.set_config(config.clone()));
        assert!(!ctx.set_config(config));
        assert_eq!(ctx.config_version(), start + 1);
    }

    #[test]
    fn set_config_resolves_target() {
        let (ctx, windows) = coordinator();
        let handle = windows.open("Game", 4, 4);

        ctx.set_config(CaptureConfig::new(CaptureMethod::Modern, "Game", 30));
        assert_eq!(ctx.config().target, Some(handle));

        ctx.set_config(CaptureConfig::new(CaptureMethod::Modern, "Missing", 30));
        assert_eq!(ctx.config().target, None);
    }

    #[test]
    fn caller_supplied_handle_is_replaced() {
        let (ctx, _) = coordinator();
        let mut config = CaptureConfig::new(CaptureMethod::Compat, "Nowhere", 30);
        config.target = Some(crate::capture::TargetHandle::new(42));
        ctx.set_config(config);
        assert_eq!(ctx.config().target, None);
    }

    #[test]
    fn waiter_released_by_new_frame() {
        let (ctx, _) = coordinator();
        ctx.set_mapping(true);
        ctx.set_inferencing(true);

        let waiter = ctx.clone();
        let (tx, rx) = flume::bounded(1);
        let handle = thread::spawn(move || {
            let _ = tx.send(waiter.wait_for_new_frame(0));
        });
        thread::sleep(Duration::from_millis(50));
        ctx.set_frame(frame(3));

        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got.sequence_id, 3);
        handle.join().unwrap();
    }

    #[test]
    fn waiter_returns_immediately_when_frame_already_newer() {
        let (ctx, _) = coordinator();
        ctx.set_mapping(true);
        ctx.set_inferencing(true);
        ctx.set_frame(frame(7));
        assert_eq!(ctx.wait_for_new_frame(6).sequence_id, 7);
    }

    #[test]
    fn inferencing_off_yields_empty_frame() {
        let (ctx, _) = coordinator();
        ctx.set_mapping(true);
        ctx.set_inferencing(false);
        ctx.set_frame(frame(5));

        let got = ctx.wait_for_new_frame(0);
        assert!(got.is_empty());
        assert_eq!(got.sequence_id, NO_SEQUENCE);
    }

    #[test]
    fn mapping_off_without_frame_yields_empty() {
        let (ctx, _) = coordinator();
        ctx.set_mapping(false);
        ctx.set_inferencing(true);
        let got = ctx.wait_for_new_frame(10);
        assert!(got.is_empty());
        assert_eq!(got.sequence_id, NO_SEQUENCE);
    }

    #[test]
    fn mapping_toggle_releases_waiter() {
        let (ctx, _) = coordinator();
        ctx.set_mapping(true);
        ctx.set_inferencing(true);

        let waiter = ctx.clone();
        let (tx, rx) = flume::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(waiter.wait_for_new_frame(0));
        });
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());

        ctx.set_mapping(false);
        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn inferencing_toggle_wakes_waiter() {
        let (ctx, _) = coordinator();
        ctx.set_mapping(true);
        ctx.set_inferencing(true);

        let waiter = ctx.clone();
        let (tx, rx) = flume::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(waiter.wait_for_new_frame(0));
        });
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());

        // Mapping stays on; turning inferencing off alone must release it.
        ctx.set_inferencing(false);
        let got = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("waiter still parked after inferencing was turned off");
        assert!(got.is_empty());
        assert!(ctx.is_mapping());
    }

    #[test]
    fn inferencing_enable_also_releases_waiter() {
        let (ctx, _) = coordinator();
        ctx.set_mapping(true);

        let waiter = ctx.clone();
        let (tx, rx) = flume::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(waiter.wait_for_new_frame(0));
        });
        thread::sleep(Duration::from_millis(50));

        // Nothing qualifies yet, so the released waiter gets an empty frame.
        ctx.set_inferencing(true);
        let got = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(got.sequence_id, NO_SEQUENCE);
    }

    #[test]
    fn stop_sequence_releases_blocked_waiter() {
        let (ctx, _) = coordinator();
        ctx.set_mapping(true);
        ctx.set_inferencing(true);
        let waiter = ctx.clone();
        let stopper = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stopper.set_mapping(false);
            stopper.set_inferencing(false);
        });
        let got = within(move || waiter.wait_for_new_frame(100));
        assert!(got.is_empty());
    }

    #[test]
    fn depth_frames_always_overwrite() {
        let (ctx, _) = coordinator();
        ctx.set_depth_frame(frame(9));
        ctx.set_depth_frame(frame(4));
        assert_eq!(ctx.depth_frame().sequence_id, 4);
    }

    #[test]
    fn telemetry_reflects_counters() {
        let (ctx, _) = coordinator();
        ctx.set_capture_time(12.5);
        ctx.set_inference_time(40.25);
        ctx.set_frame(frame(3));
        let telemetry = ctx.telemetry();
        assert_eq!(telemetry.capture_ms, 12.5);
        assert_eq!(telemetry.inference_ms, 40.25);
        assert_eq!(telemetry.frame_sequence, 3);
        assert_eq!(telemetry.depth_sequence, NO_SEQUENCE);
    }
}

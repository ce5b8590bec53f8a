use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use super::broadcast::{BroadcastLoop, FrameSink};
use super::capture_loop::CaptureLoop;
use super::inference_loop::InferenceLoop;
use super::{SharedCoordinator, Telemetry};
use crate::capture::{CaptureConfig, ScreenGrabber, WindowSource};
use crate::inference::EngineLoader;
use crate::{Config, Error, Result};

/// Owns the coordinator and the worker threads around it.
pub struct System {
    config: Config,
    coordinator: Arc<SharedCoordinator>,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl System {
    /// Validate `config` and seed a coordinator with its starting capture
    /// settings and run-state flags. No threads run until [`System::start`].
    pub fn new(config: Config, source: Arc<dyn WindowSource>) -> Result<Self> {
        config.validate()?;

        let coordinator = Arc::new(SharedCoordinator::new(source));
        coordinator.set_config(CaptureConfig::from(&config.capture));
        coordinator.set_mapping(config.pipeline.mapping);
        coordinator.set_inferencing(config.inference.enabled);

        Ok(Self {
            config,
            coordinator,
            running: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        })
    }

    pub fn coordinator(&self) -> &Arc<SharedCoordinator> {
        &self.coordinator
    }

    pub fn telemetry(&self) -> Telemetry {
        self.coordinator.telemetry()
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Spawn the capture, inference and broadcast workers. The engine is
    /// loaded on the inference thread; a load failure stops only that worker.
    pub fn start(&mut self, loader: EngineLoader, sinks: Vec<Box<dyn FrameSink>>) -> Result<()> {
        if self.is_running() {
            warn!("System already started");
            return Ok(());
        }
        self.running.store(true, Ordering::Release);

        if let Err(e) = self.spawn_workers(loader, sinks) {
            self.stop();
            return Err(e);
        }
        info!(workers = self.workers.len(), "System started");
        Ok(())
    }

    fn spawn_workers(&mut self, loader: EngineLoader, sinks: Vec<Box<dyn FrameSink>>) -> Result<()> {
        let coordinator = self.coordinator.clone();
        let running = self.running.clone();
        self.spawn("depthcast-capture", move || {
            let grabber = ScreenGrabber::new(coordinator.clone());
            CaptureLoop::new(coordinator, grabber, running).run();
        })?;

        let coordinator = self.coordinator.clone();
        let running = self.running.clone();
        let idle_poll = Duration::from_millis(self.config.pipeline.idle_poll_ms);
        self.spawn("depthcast-inference", move || match loader() {
            Ok(engine) => InferenceLoop::new(coordinator, engine, running, idle_poll).run(),
            Err(e) => error!("Inference disabled: {}", e),
        })?;

        let coordinator = self.coordinator.clone();
        let running = self.running.clone();
        let interval = Duration::from_millis(self.config.pipeline.broadcast_interval_ms);
        let quality = self.config.pipeline.jpeg_quality;
        self.spawn("depthcast-broadcast", move || {
            BroadcastLoop::new(coordinator, sinks, running, interval, quality).run();
        })?;

        Ok(())
    }

    fn spawn(&mut self, name: &'static str, body: impl FnOnce() + Send + 'static) -> Result<()> {
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(body)
            .map_err(|source| Error::Spawn { name, source })?;
        self.workers.push(handle);
        Ok(())
    }

    /// Clear the running flag, release any blocked waiter and join every
    /// worker. Safe to call more than once.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        info!("Stopping system");
        self.running.store(false, Ordering::Release);
        self.coordinator.set_mapping(false);
        self.coordinator.set_inferencing(false);

        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(thread = %name, "Worker panicked");
            }
        }
        info!("System stopped");
    }
}

impl Drop for System {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureMethod, SyntheticWindows};

    fn loader_failing() -> EngineLoader {
        Box::new(|| {
            Err(Error::EngineInit {
                reason: "no weights".into(),
            })
        })
    }

    #[test]
    fn new_seeds_coordinator_from_config() {
        let windows = Arc::new(SyntheticWindows::new());
        let target = windows.open("GameProcess", 8, 8);
        let mut config = Config::default();
        config.capture.method = CaptureMethod::Compat;
        config.pipeline.mapping = true;

        let system = System::new(config, windows).unwrap();
        let ctx = system.coordinator();
        assert_eq!(ctx.config().target, Some(target));
        assert_eq!(ctx.config().method, CaptureMethod::Compat);
        assert_eq!(ctx.config_version(), 1);
        assert!(ctx.is_mapping());
        assert!(!ctx.is_inferencing());
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = Config::default();
        config.capture.fps = 0;
        assert!(matches!(
            System::new(config, Arc::new(SyntheticWindows::new())),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut system = System::new(Config::default(), Arc::new(SyntheticWindows::new())).unwrap();
        system.stop();

        system.start(loader_failing(), Vec::new()).unwrap();
        assert!(system.is_running());
        system.start(loader_failing(), Vec::new()).unwrap();

        system.stop();
        assert!(!system.is_running());
        system.stop();
    }

    #[test]
    fn restart_keeps_publishing_frames() {
        let windows = Arc::new(SyntheticWindows::new());
        windows.open("GameProcess", 8, 8);
        let mut config = Config::default();
        config.capture.method = CaptureMethod::Compat;
        config.capture.fps = 100;

        let mut system = System::new(config, windows).unwrap();
        let wait_for = |system: &System, seq: i64| {
            let deadline = std::time::Instant::now() + Duration::from_secs(2);
            while system.telemetry().frame_sequence < seq && std::time::Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            system.telemetry().frame_sequence
        };

        system.start(loader_failing(), Vec::new()).unwrap();
        let before = wait_for(&system, 10);
        system.stop();
        assert!(before >= 10);

        system.start(loader_failing(), Vec::new()).unwrap();
        let after = wait_for(&system, before + 3);
        system.stop();
        assert!(after >= before + 3, "no frames after restart: {before} -> {after}");
    }

    #[test]
    fn engine_failure_leaves_capture_running() {
        let windows = Arc::new(SyntheticWindows::new());
        windows.open("GameProcess", 8, 8);
        let mut config = Config::default();
        config.capture.method = CaptureMethod::Compat;
        config.inference.enabled = true;

        let mut system = System::new(config, windows).unwrap();
        system.start(loader_failing(), Vec::new()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while system.telemetry().frame_sequence < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(system.telemetry().frame_sequence >= 2);
        assert!(system.coordinator().depth_frame().is_empty());
    }
}

use std::sync::Arc;

use image::RgbImage;
use tracing::{info, trace};

use super::backend::{default_factory, BackendFactory, CaptureBackend};
use super::config::{BackendKind, CaptureConfig};
use crate::pipeline::SharedCoordinator;

/// Keeps one capture backend in step with the coordinator's configuration.
///
/// The full configuration is only fetched (under the coordinator lock) when
/// the lock-free version counter moved since the last tick.
pub struct ScreenGrabber {
    coordinator: Arc<SharedCoordinator>,
    factory: BackendFactory,
    backend: Option<Box<dyn CaptureBackend>>,
    active: Option<CaptureConfig>,
    /// `None` until the first sync.
    local_version: Option<u64>,
}

impl ScreenGrabber {
    pub fn new(coordinator: Arc<SharedCoordinator>) -> Self {
        let factory = default_factory(coordinator.window_source().clone());
        Self::with_factory(coordinator, factory)
    }

    pub fn with_factory(coordinator: Arc<SharedCoordinator>, factory: BackendFactory) -> Self {
        Self {
            coordinator,
            factory,
            backend: None,
            active: None,
            local_version: None,
        }
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|backend| backend.kind())
    }

    pub fn active_config(&self) -> Option<&CaptureConfig> {
        self.active.as_ref()
    }

    /// Capture one image from the configured target.
    ///
    /// `None` when nothing is configured, the target did not resolve, or the
    /// backend missed this tick.
    pub fn grab(&mut self) -> Option<RgbImage> {
        self.sync_config();

        let target = self.active.as_ref()?.target?;
        let backend = self.backend.as_mut()?;
        let image = backend.capture(target);
        if image.is_none() {
            trace!(%target, "No frame this tick");
            metrics::counter!("depthcast_capture_misses").increment(1);
        }
        image
    }

    fn sync_config(&mut self) {
        let version = self.coordinator.config_version();
        if self.local_version == Some(version) {
            return;
        }
        let config = self.coordinator.config();
        self.apply(config);
        self.local_version = Some(version);
    }

    fn apply(&mut self, config: CaptureConfig) {
        if self.active.as_ref() == Some(&config) {
            return;
        }

        let wanted = config.method.backend_kind();
        if self.active_backend() != Some(wanted) {
            // Tear down fully before the replacement exists.
            if let Some(mut old) = self.backend.take() {
                old.cleanup();
            }
            self.backend = Some((self.factory)(config.method));
            metrics::counter!("depthcast_backend_swaps").increment(1);
            info!(method = ?config.method, backend = ?wanted, "Capture backend switched");
        }
        self.active = Some(config);
    }
}

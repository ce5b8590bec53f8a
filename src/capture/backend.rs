//! Swappable capture strategies.

use std::sync::Arc;

use image::RgbImage;
use tracing::{debug, trace};

use super::config::{BackendKind, CaptureMethod, TargetHandle};
use super::source::{WindowSource, WindowState, BGRA_BYTES};

/// One window-to-image capture strategy.
///
/// `capture` runs once per tick at the configured frame rate, so
/// implementations keep per-size resources and only rebuild them when the
/// target's dimensions change.
pub trait CaptureBackend: Send {
    fn kind(&self) -> BackendKind;

    /// `None` for routine misses: closed, minimized or unchanged windows.
    fn capture(&mut self, target: TargetHandle) -> Option<RgbImage>;

    /// Release every backend-owned resource.
    fn cleanup(&mut self);
}

/// Builds the backend for a capture method.
pub type BackendFactory = Box<dyn Fn(CaptureMethod) -> Box<dyn CaptureBackend> + Send>;

/// Factory producing the bundled backends over `source`.
pub fn default_factory(source: Arc<dyn WindowSource>) -> BackendFactory {
    Box::new(move |method| match method.backend_kind() {
        BackendKind::Modern => Box::new(ModernBackend::new(source.clone())),
        BackendKind::Baseline => Box::new(CompatBackend::new(source.clone())),
    })
}

fn usable(state: Option<WindowState>) -> Option<WindowState> {
    state.filter(|s| !s.minimized && s.width > 0 && s.height > 0)
}

fn bgra_to_rgb(bgra: &[u8], width: u32, height: u32) -> Option<RgbImage> {
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for px in bgra.chunks_exact(BGRA_BYTES) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    RgbImage::from_raw(width, height, rgb)
}

/// Baseline full-content copy into a cached staging surface.
pub struct CompatBackend {
    source: Arc<dyn WindowSource>,
    staging: Vec<u8>,
    cached_size: Option<(u32, u32)>,
}

impl CompatBackend {
    pub fn new(source: Arc<dyn WindowSource>) -> Self {
        Self {
            source,
            staging: Vec::new(),
            cached_size: None,
        }
    }
}

impl CaptureBackend for CompatBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Baseline
    }

    fn capture(&mut self, target: TargetHandle) -> Option<RgbImage> {
        let state = usable(self.source.state(target))?;
        let size = (state.width, state.height);

        if self.cached_size != Some(size) {
            self.cleanup();
            debug!(width = size.0, height = size.1, "compat: allocating staging surface");
            self.staging = vec![0; state.byte_len()];
            self.cached_size = Some(size);
        }

        if !self.source.read_bgra(target, size.0, size.1, &mut self.staging) {
            trace!(%target, "compat: window copy failed");
            return None;
        }
        bgra_to_rgb(&self.staging, size.0, size.1)
    }

    fn cleanup(&mut self) {
        self.staging = Vec::new();
        self.cached_size = None;
    }
}

impl Drop for CompatBackend {
    fn drop(&mut self) {
        self.cleanup();
    }
}

struct Session {
    target: TargetHandle,
    last_present: Option<u64>,
}

/// Session-bound capture that only yields newly presented frames.
pub struct ModernBackend {
    source: Arc<dyn WindowSource>,
    session: Option<Session>,
    staging: Vec<u8>,
    staging_size: Option<(u32, u32)>,
}

impl ModernBackend {
    pub fn new(source: Arc<dyn WindowSource>) -> Self {
        Self {
            source,
            session: None,
            staging: Vec::new(),
            staging_size: None,
        }
    }

    fn bind(&mut self, target: TargetHandle) -> bool {
        self.cleanup();
        if self.source.state(target).is_none() {
            return false;
        }
        debug!(%target, "modern: capture session started");
        self.session = Some(Session {
            target,
            last_present: None,
        });
        true
    }
}

impl CaptureBackend for ModernBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Modern
    }

    fn capture(&mut self, target: TargetHandle) -> Option<RgbImage> {
        let bound = self.session.as_ref().map(|s| s.target);
        if bound != Some(target) && !self.bind(target) {
            return None;
        }

        let state = usable(self.source.state(target))?;
        let presents = self.source.present_count(target);
        let session = self.session.as_mut()?;
        if session.last_present.is_some_and(|seen| presents <= seen) {
            // Frame pool is empty: nothing new since the last capture.
            return None;
        }

        let size = (state.width, state.height);
        if self.staging_size != Some(size) {
            self.staging = vec![0; state.byte_len()];
            self.staging_size = Some(size);
        }
        if !self.source.read_bgra(target, size.0, size.1, &mut self.staging) {
            return None;
        }
        session.last_present = Some(presents);
        bgra_to_rgb(&self.staging, size.0, size.1)
    }

    fn cleanup(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(target = %session.target, "modern: capture session closed");
        }
        self.staging = Vec::new();
        self.staging_size = None;
    }
}

impl Drop for ModernBackend {
    fn drop(&mut self) {
        self.cleanup();
    }
}

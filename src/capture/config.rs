use std::fmt;

use serde::{Deserialize, Serialize};

/// Frame rate used when a configuration carries a non-positive one.
pub const DEFAULT_FPS: u32 = 30;

/// Highest frame rate the capture loop paces to.
pub const MAX_FPS: u32 = 1000;

/// Window capture strategy selected by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    /// Full-content window copy; works everywhere, moderate cost.
    Compat,
    /// Reserved for a swap-chain hook; captured with the baseline backend.
    Performant,
    /// Session-based capture that only yields frames the window presented.
    Modern,
}

/// Backend implementation actually running for a [`CaptureMethod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Baseline,
    Modern,
}

impl CaptureMethod {
    pub fn backend_kind(self) -> BackendKind {
        match self {
            CaptureMethod::Modern => BackendKind::Modern,
            CaptureMethod::Compat | CaptureMethod::Performant => BackendKind::Baseline,
        }
    }

    /// Index used on the control channel.
    pub fn index(self) -> u8 {
        match self {
            CaptureMethod::Compat => 0,
            CaptureMethod::Performant => 1,
            CaptureMethod::Modern => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(CaptureMethod::Compat),
            1 => Some(CaptureMethod::Performant),
            2 => Some(CaptureMethod::Modern),
            _ => None,
        }
    }
}

/// Opaque reference to a live window, resolved from its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(u64);

impl TargetHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Capture configuration shared through the coordinator.
///
/// Equality covers all four fields, so re-resolving the same title to a new
/// window counts as a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub method: CaptureMethod,
    pub window_name: String,
    /// `None` when the title did not resolve to a running window.
    pub target: Option<TargetHandle>,
    pub fps: u32,
}

impl CaptureConfig {
    pub fn new(method: CaptureMethod, window_name: impl Into<String>, fps: u32) -> Self {
        Self {
            method,
            window_name: window_name.into(),
            target: None,
            fps,
        }
    }

    /// Target frame rate, substituting the default for zero.
    pub fn effective_fps(&self) -> u32 {
        if self.fps > 0 {
            self.fps.min(MAX_FPS)
        } else {
            DEFAULT_FPS
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new(CaptureMethod::Modern, "GameProcess", DEFAULT_FPS)
    }
}

impl From<&crate::CaptureSettings> for CaptureConfig {
    fn from(settings: &crate::CaptureSettings) -> Self {
        Self::new(settings.method, settings.window_name.clone(), settings.fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unimplemented_methods_use_baseline() {
        assert_eq!(CaptureMethod::Compat.backend_kind(), BackendKind::Baseline);
        assert_eq!(CaptureMethod::Performant.backend_kind(), BackendKind::Baseline);
        assert_eq!(CaptureMethod::Modern.backend_kind(), BackendKind::Modern);
    }

    #[test]
    fn equality_includes_target() {
        let a = CaptureConfig::new(CaptureMethod::Compat, "X", 30);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.target = Some(TargetHandle::new(7));
        assert_ne!(a, b);
    }

    #[test]
    fn zero_fps_uses_default() {
        let config = CaptureConfig::new(CaptureMethod::Compat, "X", 0);
        assert_eq!(config.effective_fps(), DEFAULT_FPS);
    }

    #[test]
    fn effective_fps_is_capped() {
        let config = CaptureConfig::new(CaptureMethod::Compat, "X", 5000);
        assert_eq!(config.effective_fps(), MAX_FPS);
    }

    #[test]
    fn method_index_matches_control_channel() {
        for method in [CaptureMethod::Compat, CaptureMethod::Performant, CaptureMethod::Modern] {
            assert_eq!(CaptureMethod::from_index(method.index()), Some(method));
        }
        assert_eq!(CaptureMethod::from_index(9), None);
    }
}

//! Windowing environment boundary.
//!
//! Backends never talk to a platform directly; they go through a
//! [`WindowSource`], which resolves titles to handles and copies window
//! contents into caller-owned buffers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::config::TargetHandle;

/// Bytes per pixel of the BGRA layout returned by [`WindowSource::read_bgra`].
pub const BGRA_BYTES: usize = 4;

/// Client-area geometry of a live window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub width: u32,
    pub height: u32,
    pub minimized: bool,
}

impl WindowState {
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BGRA_BYTES
    }
}

pub trait WindowSource: Send + Sync {
    /// Exact-title lookup. `None` covers both "no such window" and "not running".
    fn find(&self, title: &str) -> Option<TargetHandle>;

    /// Titles of visible windows, for target pickers.
    fn window_titles(&self) -> Vec<String>;

    /// `None` once the window is closed.
    fn state(&self, target: TargetHandle) -> Option<WindowState>;

    /// Number of frames the window has presented so far.
    fn present_count(&self, target: TargetHandle) -> u64;

    /// Copy the full window content as BGRA into `dst`, which must hold
    /// exactly `width * height * 4` bytes matching the current size.
    fn read_bgra(&self, target: TargetHandle, width: u32, height: u32, dst: &mut [u8]) -> bool;
}

#[derive(Debug)]
struct SyntheticWindow {
    title: String,
    state: WindowState,
    presents: u64,
}

/// In-process windows rendering an animated test pattern.
///
/// Used for demo runs and tests; every [`present`](Self::present) advances
/// the pattern by one step.
#[derive(Debug, Default)]
pub struct SyntheticWindows {
    windows: Mutex<BTreeMap<u64, SyntheticWindow>>,
    next_handle: AtomicU64,
}

impl SyntheticWindows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, title: impl Into<String>, width: u32, height: u32) -> TargetHandle {
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.windows.lock().insert(
            raw,
            SyntheticWindow {
                title: title.into(),
                state: WindowState {
                    width,
                    height,
                    minimized: false,
                },
                presents: 0,
            },
        );
        TargetHandle::new(raw)
    }

    pub fn close(&self, target: TargetHandle) {
        self.windows.lock().remove(&target.raw());
    }

    pub fn resize(&self, target: TargetHandle, width: u32, height: u32) {
        if let Some(window) = self.windows.lock().get_mut(&target.raw()) {
            window.state.width = width;
            window.state.height = height;
        }
    }

    pub fn set_minimized(&self, target: TargetHandle, minimized: bool) {
        if let Some(window) = self.windows.lock().get_mut(&target.raw()) {
            window.state.minimized = minimized;
        }
    }

    /// Simulate the window drawing a new frame.
    pub fn present(&self, target: TargetHandle) {
        if let Some(window) = self.windows.lock().get_mut(&target.raw()) {
            window.presents += 1;
        }
    }

    pub fn present_all(&self) {
        for window in self.windows.lock().values_mut() {
            window.presents += 1;
        }
    }
}

impl WindowSource for SyntheticWindows {
    fn find(&self, title: &str) -> Option<TargetHandle> {
        self.windows
            .lock()
            .iter()
            .find(|(_, window)| window.title == title)
            .map(|(raw, _)| TargetHandle::new(*raw))
    }

    fn window_titles(&self) -> Vec<String> {
        self.windows
            .lock()
            .values()
            .filter(|window| !window.title.is_empty())
            .map(|window| window.title.clone())
            .collect()
    }

    fn state(&self, target: TargetHandle) -> Option<WindowState> {
        self.windows.lock().get(&target.raw()).map(|window| window.state)
    }

    fn present_count(&self, target: TargetHandle) -> u64 {
        self.windows
            .lock()
            .get(&target.raw())
            .map(|window| window.presents)
            .unwrap_or(0)
    }

    fn read_bgra(&self, target: TargetHandle, width: u32, height: u32, dst: &mut [u8]) -> bool {
        let windows = self.windows.lock();
        let Some(window) = windows.get(&target.raw()) else {
            return false;
        };
        let state = window.state;
        if state.width != width || state.height != height || dst.len() != state.byte_len() {
            return false;
        }

        let phase = window.presents as u32;
        for (i, px) in dst.chunks_exact_mut(BGRA_BYTES).enumerate() {
            let x = i as u32 % width;
            let y = i as u32 / width;
            px[0] = ((x ^ y) & 0xff) as u8; // B
            px[1] = (y.wrapping_add(phase) & 0xff) as u8; // G
            px[2] = (x.wrapping_add(phase) & 0xff) as u8; // R
            px[3] = 0xff;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_titles_only() {
        let windows = SyntheticWindows::new();
        let game = windows.open("Game", 8, 8);
        windows.open("Editor", 8, 8);

        assert_eq!(windows.find("Game"), Some(game));
        assert_eq!(windows.find("game"), None);
        assert_eq!(windows.window_titles().len(), 2);

        windows.close(game);
        assert_eq!(windows.find("Game"), None);
        assert_eq!(windows.state(game), None);
    }

    #[test]
    fn read_rejects_stale_dimensions() {
        let windows = SyntheticWindows::new();
        let target = windows.open("Game", 4, 4);
        let mut buf = vec![0u8; 4 * 4 * BGRA_BYTES];
        assert!(windows.read_bgra(target, 4, 4, &mut buf));
        assert_eq!(buf[3], 0xff);

        windows.resize(target, 6, 4);
        assert!(!windows.read_bgra(target, 4, 4, &mut buf));
    }

    #[test]
    fn present_advances_pattern() {
        let windows = SyntheticWindows::new();
        let target = windows.open("Game", 2, 1);
        let mut before = vec![0u8; 2 * BGRA_BYTES];
        let mut after = before.clone();

        windows.read_bgra(target, 2, 1, &mut before);
        windows.present(target);
        windows.read_bgra(target, 2, 1, &mut after);

        assert_eq!(windows.present_count(target), 1);
        assert_ne!(before, after);
    }
}

#![forbid(unsafe_code)]

//! Window-resize detection.
//!
//! A resize arrives as SIGWINCH, which may fire between any two manager
//! operations. The signal handler does nothing but set an atomic flag; the
//! manager polls and consumes the flag at its entry points, so all layout
//! work stays on the calling thread and nothing async-signal-unsafe runs
//! in the handler.
//!
//! On platforms without SIGWINCH the latch never fires and layout simply
//! does not adapt to live resizes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// When a latched resize is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResizeMode {
    /// Applied at the start of every manager operation.
    #[default]
    Immediate,
    /// Applied on the next write. Coalesces rapid repeated resizes, and is
    /// the safe choice when multiple threads or processes share the
    /// terminal.
    Deferred,
}

/// SIGWINCH latch with scoped registration.
#[derive(Debug)]
pub struct ResizeLatch {
    flag: Arc<AtomicBool>,
    #[cfg(unix)]
    registration: Option<signal_hook::SigId>,
}

impl ResizeLatch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            #[cfg(unix)]
            registration: None,
        }
    }

    /// Start latching SIGWINCH. Idempotent.
    #[cfg(unix)]
    pub fn register(&mut self) -> std::io::Result<()> {
        if self.registration.is_none() {
            let id = signal_hook::flag::register(
                signal_hook::consts::SIGWINCH,
                Arc::clone(&self.flag),
            )?;
            self.registration = Some(id);
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn register(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    /// Stop latching. Idempotent; also runs on drop.
    #[cfg(unix)]
    pub fn unregister(&mut self) {
        if let Some(id) = self.registration.take() {
            signal_hook::low_level::unregister(id);
        }
    }

    #[cfg(not(unix))]
    pub fn unregister(&mut self) {}

    /// Consume the latched flag, returning whether a resize was pending.
    #[must_use]
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::Relaxed)
    }

    /// Latch a resize by hand. Used by tests in place of a real signal.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

impl Default for ResizeLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ResizeLatch {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes_the_flag() {
        let latch = ResizeLatch::new();
        assert!(!latch.take());
        latch.set();
        assert!(latch.take());
        assert!(!latch.take());
    }

    #[test]
    fn repeated_latches_coalesce() {
        let latch = ResizeLatch::new();
        latch.set();
        latch.set();
        latch.set();
        assert!(latch.take());
        assert!(!latch.take());
    }

    #[test]
    fn unregister_without_register_is_harmless() {
        let mut latch = ResizeLatch::new();
        latch.unregister();
    }
}

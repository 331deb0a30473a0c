#![forbid(unsafe_code)]

//! Two-phase frame staging.
//!
//! Every logical operation stages all of its control sequences and widget
//! text first, then flushes the accumulated bytes as a single write. A
//! layout change that repositions several widgets therefore reaches the
//! terminal as one atomic-looking update instead of a visible shuffle.
//!
//! The companion buffer carries only cursor and scroll synchronization for
//! a second stream sharing the same terminal; widget text never goes there.

use std::io::Write;

/// Pending output for the primary stream and an optional companion.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    primary: Vec<u8>,
    companion: Vec<u8>,
}

impl FrameBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to the pending primary frame.
    pub fn stage(&mut self, fragment: impl AsRef<[u8]>) {
        self.primary.extend_from_slice(fragment.as_ref());
    }

    /// Append a cursor-sync fragment to the pending companion frame.
    pub fn stage_companion(&mut self, fragment: impl AsRef<[u8]>) {
        self.companion.extend_from_slice(fragment.as_ref());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.companion.is_empty()
    }

    /// Write each pending frame as a single call and flush the streams.
    ///
    /// Buffers are cleared even when a write fails; retrying a torn frame
    /// against a moved cursor would only compound the damage.
    ///
    /// # Errors
    ///
    /// The first I/O error from either stream.
    pub fn flush(
        &mut self,
        primary: &mut dyn Write,
        companion: Option<&mut dyn Write>,
    ) -> std::io::Result<()> {
        let result = self.flush_inner(primary, companion);
        self.primary.clear();
        self.companion.clear();
        result
    }

    /// Flush for teardown paths: I/O errors are swallowed because there is
    /// no recovery action left at process exit.
    pub fn flush_lossy(&mut self, primary: &mut dyn Write, companion: Option<&mut dyn Write>) {
        if let Err(err) = self.flush(primary, companion) {
            tracing::debug!(error = %err, "ignoring stream error during teardown");
        }
    }

    fn flush_inner(
        &mut self,
        primary: &mut dyn Write,
        companion: Option<&mut dyn Write>,
    ) -> std::io::Result<()> {
        if !self.primary.is_empty() {
            primary.write_all(&self.primary)?;
            primary.flush()?;
        }
        if let Some(stream) = companion
            && !self.companion.is_empty()
        {
            stream.write_all(&self.companion)?;
            stream.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    #[test]
    fn flush_writes_and_clears() {
        let mut frame = FrameBuffer::new();
        frame.stage("\x1b[25;1H");
        frame.stage("hello");

        let mut sink = Cursor::new(Vec::new());
        frame.flush(&mut sink, None).unwrap();

        assert_eq!(sink.get_ref().as_slice(), b"\x1b[25;1Hhello");
        assert!(frame.is_empty());
    }

    #[test]
    fn companion_gets_only_companion_fragments() {
        let mut frame = FrameBuffer::new();
        frame.stage("widget text");
        frame.stage_companion("\x1b[22;1H");

        let mut primary = Cursor::new(Vec::new());
        let mut companion = Cursor::new(Vec::new());
        frame.flush(&mut primary, Some(&mut companion)).unwrap();

        assert_eq!(primary.get_ref().as_slice(), b"widget text");
        assert_eq!(companion.get_ref().as_slice(), b"\x1b[22;1H");
    }

    #[test]
    fn empty_frame_does_not_touch_streams() {
        struct Exploding;
        impl Write for Exploding {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                panic!("wrote to stream with empty frame");
            }
            fn flush(&mut self) -> io::Result<()> {
                panic!("flushed stream with empty frame");
            }
        }
        let mut frame = FrameBuffer::new();
        frame.flush(&mut Exploding, None).unwrap();
    }

    #[test]
    fn failed_flush_clears_buffers() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut frame = FrameBuffer::new();
        frame.stage("data");
        assert!(frame.flush(&mut Broken, None).is_err());
        assert!(frame.is_empty());
    }

    #[test]
    fn lossy_flush_swallows_errors() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut frame = FrameBuffer::new();
        frame.stage("data");
        frame.flush_lossy(&mut Broken, None);
    }
}

#![forbid(unsafe_code)]

//! Terminal surface: cached geometry and pure sequence builders.
//!
//! A [`Surface`] answers geometry queries and produces control sequences; it
//! never writes to a stream itself. The runtime stages the returned bytes
//! into a frame buffer so a whole layout change flushes as one write.
//!
//! Geometry is cached because redraws query it constantly and a real probe
//! is a syscall. [`Surface::invalidate`] forces the next query to re-probe;
//! the resize path calls it when SIGWINCH is observed.
//!
//! # Escape Sequences
//!
//! | Sequence | Meaning |
//! |----------|---------|
//! | `CSI row ; col H` | CUP, move cursor (1-indexed) |
//! | `CSI top ; bottom r` | DECSTBM, set scroll region |
//! | `CSI r` | reset scroll region to full screen |
//! | `CSI ? 25 h/l` | show / hide cursor |
//! | `CSI 0 K` | erase to end of line |
//! | `CSI 0 J` | erase to end of screen |

use crate::color::{ColorError, ColorProfile, Style};

/// Geometry fallback when the stream has no real terminal behind it.
pub const DEFAULT_GEOMETRY: Geometry = Geometry {
    width: 80,
    height: 25,
};

/// Reset scroll region to full screen.
pub const RESET_SCROLL_REGION: &str = "\x1b[r";

/// Hide cursor (DECTCEM).
pub const HIDE_CURSOR: &str = "\x1b[?25l";

/// Show cursor (DECTCEM).
pub const SHOW_CURSOR: &str = "\x1b[?25h";

/// Erase from cursor to end of line.
pub const CLEAR_EOL: &str = "\x1b[0K";

/// Erase from cursor to end of screen.
pub const CLEAR_EOS: &str = "\x1b[0J";

/// Terminal dimensions in columns and rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Columns.
    pub width: u16,
    /// Rows.
    pub height: u16,
}

/// Terminal surface with cached geometry and sequence generation.
#[derive(Debug)]
pub struct Surface {
    cached: Option<Geometry>,
    fixed: Option<Geometry>,
    width_override: Option<u16>,
    is_tty: bool,
    profile: ColorProfile,
}

impl Surface {
    /// Create a surface that probes the real terminal.
    ///
    /// `is_tty` gates both the geometry probe and color detection; a
    /// non-TTY surface always reports [`DEFAULT_GEOMETRY`].
    #[must_use]
    pub fn new(is_tty: bool) -> Self {
        Self {
            cached: None,
            fixed: None,
            width_override: None,
            is_tty,
            profile: ColorProfile::detect(is_tty),
        }
    }

    /// Create a surface with fixed geometry that never probes.
    ///
    /// Used by tests and by callers rendering to a non-terminal sink.
    #[must_use]
    pub fn with_geometry(geometry: Geometry) -> Self {
        Self {
            cached: None,
            fixed: Some(geometry),
            width_override: None,
            is_tty: false,
            profile: ColorProfile::Ansi16,
        }
    }

    /// Force a static output width regardless of probed geometry.
    #[must_use]
    pub fn with_width_override(mut self, width: Option<u16>) -> Self {
        self.width_override = width;
        self
    }

    /// Override the detected color profile.
    #[must_use]
    pub fn with_profile(mut self, profile: ColorProfile) -> Self {
        self.profile = profile;
        self
    }

    /// The color profile in effect.
    #[must_use]
    pub fn profile(&self) -> ColorProfile {
        self.profile
    }

    /// Whether the surface believes it is attached to a terminal.
    #[must_use]
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Terminal height in rows (cached).
    pub fn height(&mut self) -> u16 {
        self.geometry().height
    }

    /// Terminal width in columns (cached), honoring the width override.
    pub fn width(&mut self) -> u16 {
        self.width_override.unwrap_or_else(|| self.geometry().width)
    }

    /// Drop the cached geometry so the next query re-probes.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Pin the surface to a new fixed geometry, replacing probing.
    ///
    /// Lets callers driving a non-terminal sink model a window resize.
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.fixed = Some(geometry);
        self.cached = None;
    }

    fn geometry(&mut self) -> Geometry {
        if let Some(fixed) = self.fixed {
            return fixed;
        }
        if let Some(cached) = self.cached {
            return cached;
        }
        let probed = if self.is_tty {
            match probe() {
                Some(geometry) => geometry,
                None => {
                    tracing::debug!(
                        width = DEFAULT_GEOMETRY.width,
                        height = DEFAULT_GEOMETRY.height,
                        "geometry probe failed, using fallback"
                    );
                    DEFAULT_GEOMETRY
                }
            }
        } else {
            DEFAULT_GEOMETRY
        };
        self.cached = Some(probed);
        probed
    }

    /// CUP: move the cursor to `row`, `col` (both 1-indexed).
    #[must_use]
    pub fn move_to(&self, row: u16, col: u16) -> String {
        format!("\x1b[{row};{col}H")
    }

    /// DECSTBM: constrain scrolling to rows `top..=bottom` (1-indexed).
    #[must_use]
    pub fn set_scroll_region(&self, top: u16, bottom: u16) -> String {
        format!("\x1b[{top};{bottom}r")
    }

    /// Reset the scroll region to the full screen.
    #[must_use]
    pub fn reset_scroll_region(&self) -> &'static str {
        RESET_SCROLL_REGION
    }

    /// Hide the cursor.
    #[must_use]
    pub fn hide_cursor(&self) -> &'static str {
        HIDE_CURSOR
    }

    /// Show the cursor.
    #[must_use]
    pub fn show_cursor(&self) -> &'static str {
        SHOW_CURSOR
    }

    /// Erase from the cursor to the end of the line.
    #[must_use]
    pub fn clear_eol(&self) -> &'static str {
        CLEAR_EOL
    }

    /// Erase from the cursor to the end of the screen.
    #[must_use]
    pub fn clear_eos(&self) -> &'static str {
        CLEAR_EOS
    }

    /// A single line feed.
    #[must_use]
    pub fn feed_line(&self) -> &'static str {
        "\n"
    }

    /// Wrap `text` in the style's on/off sequences under this surface's
    /// profile. Unsupported colors downgrade; they never pass through raw.
    ///
    /// # Errors
    ///
    /// Currently infallible for resolved styles; kept fallible so name
    /// resolution errors surface here once callers pass unparsed specs.
    pub fn colorize(&self, text: &str, style: &Style) -> Result<String, ColorError> {
        Ok(style.apply(text, self.profile))
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn probe() -> Option<Geometry> {
    crossterm::terminal::size()
        .ok()
        .map(|(width, height)| Geometry { width, height })
}

#[cfg(target_arch = "wasm32")]
fn probe() -> Option<Geometry> {
    None
}

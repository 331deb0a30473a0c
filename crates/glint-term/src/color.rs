#![forbid(unsafe_code)]

//! Color types, profiles, and downgrade utilities.
//!
//! A [`Color`] may be a named ANSI color, an 8-bit palette index, or an
//! explicit RGB triple. A [`Style`] combines optional foreground and
//! background colors with text attributes (bold, underline, ...).
//!
//! Styles are resolved against a [`ColorProfile`]: requesting an RGB color
//! on a 256-color terminal downgrades to the nearest palette entry, and on
//! a 16-color terminal to the nearest ANSI color. A `Mono` profile drops
//! color entirely rather than emitting sequences the terminal cannot
//! render.

use std::fmt;

use bitflags::bitflags;

/// Terminal color profile used for downgrade decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorProfile {
    /// No color output.
    Mono,
    /// Standard 16 ANSI colors.
    Ansi16,
    /// Extended 256-color palette.
    Ansi256,
    /// Full 24-bit RGB color.
    TrueColor,
}

impl ColorProfile {
    /// Choose the best available profile from detection flags.
    ///
    /// `no_color` should reflect explicit user intent (e.g. NO_COLOR).
    #[must_use]
    pub const fn from_flags(true_color: bool, colors_256: bool, no_color: bool) -> Self {
        if no_color {
            Self::Mono
        } else if true_color {
            Self::TrueColor
        } else if colors_256 {
            Self::Ansi256
        } else {
            Self::Ansi16
        }
    }

    /// Detect the profile from the environment.
    ///
    /// Non-TTY streams and `TERM=dumb` are `Mono`; `NO_COLOR` wins over
    /// everything; `COLORTERM=truecolor|24bit` selects `TrueColor`; a
    /// `TERM` containing `256` selects `Ansi256`.
    #[must_use]
    pub fn detect(is_tty: bool) -> Self {
        let term = std::env::var("TERM").unwrap_or_default();
        if !is_tty || term == "dumb" {
            return Self::Mono;
        }
        let no_color = std::env::var_os("NO_COLOR").is_some();
        let colorterm = std::env::var("COLORTERM").unwrap_or_default();
        let true_color = colorterm == "truecolor" || colorterm == "24bit";
        let profile = Self::from_flags(true_color, term.contains("256"), no_color);
        tracing::debug!(?profile, term = %term, "detected color profile");
        profile
    }

    /// Check if this profile supports 24-bit true color.
    #[must_use]
    pub const fn supports_true_color(self) -> bool {
        matches!(self, Self::TrueColor)
    }
}

/// ANSI 16-color indices (0-15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Ansi16 {
    /// Black (index 0).
    Black = 0,
    /// Red (index 1).
    Red = 1,
    /// Green (index 2).
    Green = 2,
    /// Yellow (index 3).
    Yellow = 3,
    /// Blue (index 4).
    Blue = 4,
    /// Magenta (index 5).
    Magenta = 5,
    /// Cyan (index 6).
    Cyan = 6,
    /// White (index 7).
    White = 7,
    /// Bright black (index 8).
    BrightBlack = 8,
    /// Bright red (index 9).
    BrightRed = 9,
    /// Bright green (index 10).
    BrightGreen = 10,
    /// Bright yellow (index 11).
    BrightYellow = 11,
    /// Bright blue (index 12).
    BrightBlue = 12,
    /// Bright magenta (index 13).
    BrightMagenta = 13,
    /// Bright cyan (index 14).
    BrightCyan = 14,
    /// Bright white (index 15).
    BrightWhite = 15,
}

impl Ansi16 {
    /// Return the raw ANSI index (0-15).
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Convert a `u8` index to an `Ansi16` variant, returning `None` if out of range.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Black),
            1 => Some(Self::Red),
            2 => Some(Self::Green),
            3 => Some(Self::Yellow),
            4 => Some(Self::Blue),
            5 => Some(Self::Magenta),
            6 => Some(Self::Cyan),
            7 => Some(Self::White),
            8 => Some(Self::BrightBlack),
            9 => Some(Self::BrightRed),
            10 => Some(Self::BrightGreen),
            11 => Some(Self::BrightYellow),
            12 => Some(Self::BrightBlue),
            13 => Some(Self::BrightMagenta),
            14 => Some(Self::BrightCyan),
            15 => Some(Self::BrightWhite),
            _ => None,
        }
    }

    /// Representative RGB value, used for nearest-color downgrade.
    #[must_use]
    pub const fn rgb(self) -> (u8, u8, u8) {
        ANSI16_RGB[self as usize]
    }
}

/// Representative RGB values for the standard 16 colors (xterm defaults).
const ANSI16_RGB: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (205, 0, 0),
    (0, 205, 0),
    (205, 205, 0),
    (0, 0, 238),
    (205, 0, 205),
    (0, 205, 205),
    (229, 229, 229),
    (127, 127, 127),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (92, 92, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

const ANSI16_NAMES: [&str; 16] = [
    "black",
    "red",
    "green",
    "yellow",
    "blue",
    "magenta",
    "cyan",
    "white",
    "bright_black",
    "bright_red",
    "bright_green",
    "bright_yellow",
    "bright_blue",
    "bright_magenta",
    "bright_cyan",
    "bright_white",
];

/// Error raised for an unparseable color specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    /// The color name is not recognized.
    UnknownName(String),
}

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownName(name) => write!(f, "unknown color name: {name:?}"),
        }
    }
}

impl std::error::Error for ColorError {}

/// A color value at varying fidelity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// Standard 16-color ANSI value.
    Named(Ansi16),
    /// 256-color palette index.
    Indexed(u8),
    /// True-color RGB value.
    Rgb(u8, u8, u8),
}

impl Color {
    /// Parse a color from a name like `"red"` or `"bright_cyan"`.
    ///
    /// # Errors
    ///
    /// Returns [`ColorError::UnknownName`] for unrecognized names.
    pub fn parse(name: &str) -> Result<Self, ColorError> {
        let normalized = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        for (idx, known) in ANSI16_NAMES.iter().enumerate() {
            if normalized == *known {
                // Index is in range by construction.
                return Ok(Self::Named(Ansi16::from_u8(idx as u8).unwrap_or(Ansi16::White)));
            }
        }
        Err(ColorError::UnknownName(name.to_string()))
    }

    /// RGB value of this color (palette entries use xterm defaults).
    #[must_use]
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Named(named) => named.rgb(),
            Self::Indexed(idx) => ansi256_rgb(idx),
            Self::Rgb(r, g, b) => (r, g, b),
        }
    }

    /// Downgrade to a color representable by `profile`.
    ///
    /// Returns `None` when the profile is `Mono`.
    #[must_use]
    pub fn downgrade(self, profile: ColorProfile) -> Option<Self> {
        match profile {
            ColorProfile::Mono => None,
            ColorProfile::TrueColor => Some(self),
            ColorProfile::Ansi256 => match self {
                Self::Rgb(r, g, b) => Some(Self::Indexed(rgb_to_ansi256(r, g, b))),
                other => Some(other),
            },
            ColorProfile::Ansi16 => {
                let (r, g, b) = self.rgb();
                Some(Self::Named(nearest_ansi16(r, g, b)))
            }
        }
    }

    /// Append the SGR parameters for this color to `out`.
    ///
    /// `base` is 38 for foreground, 48 for background.
    fn push_sgr(self, out: &mut String, base: u8) {
        use std::fmt::Write as _;
        match self {
            Self::Named(named) => {
                let idx = named.as_u8();
                let code = if idx < 8 {
                    u16::from(base) - 8 + u16::from(idx)
                } else {
                    u16::from(base) + 52 + u16::from(idx - 8)
                };
                let _ = write!(out, "{code}");
            }
            Self::Indexed(idx) => {
                let _ = write!(out, "{base};5;{idx}");
            }
            Self::Rgb(r, g, b) => {
                let _ = write!(out, "{base};2;{r};{g};{b}");
            }
        }
    }
}

/// RGB value of a 256-palette index (xterm layout).
#[must_use]
fn ansi256_rgb(idx: u8) -> (u8, u8, u8) {
    if idx < 16 {
        return ANSI16_RGB[idx as usize];
    }
    if idx < 232 {
        // 6x6x6 color cube.
        let idx = idx - 16;
        let steps = [0u8, 95, 135, 175, 215, 255];
        let r = steps[(idx / 36) as usize];
        let g = steps[((idx / 6) % 6) as usize];
        let b = steps[(idx % 6) as usize];
        return (r, g, b);
    }
    // Grayscale ramp: 8, 18, ..., 238.
    let level = 8 + (idx - 232) * 10;
    (level, level, level)
}

/// Map an RGB triple to the nearest 256-palette index.
#[must_use]
fn rgb_to_ansi256(r: u8, g: u8, b: u8) -> u8 {
    // Prefer the grayscale ramp for near-gray colors.
    let (ri, gi, bi) = (i32::from(r), i32::from(g), i32::from(b));
    if (ri - gi).abs() < 8 && (gi - bi).abs() < 8 {
        let avg = (ri + gi + bi) / 3;
        if avg > 238 {
            return 231; // cube white
        }
        if avg >= 8 {
            return 232 + ((avg - 8) / 10) as u8;
        }
        return 16; // cube black
    }
    let quantize = |c: i32| -> u8 {
        if c < 48 {
            0
        } else if c < 115 {
            1
        } else {
            ((c - 35) / 40) as u8
        }
    };
    16 + 36 * quantize(ri) + 6 * quantize(gi) + quantize(bi)
}

/// Find the nearest standard 16-color by squared RGB distance.
#[must_use]
fn nearest_ansi16(r: u8, g: u8, b: u8) -> Ansi16 {
    let mut best = 0u8;
    let mut best_dist = i64::MAX;
    for (idx, (cr, cg, cb)) in ANSI16_RGB.iter().enumerate() {
        let dr = i64::from(r) - i64::from(*cr);
        let dg = i64::from(g) - i64::from(*cg);
        let db = i64::from(b) - i64::from(*cb);
        let dist = dr * dr + dg * dg + db * db;
        if dist < best_dist {
            best_dist = dist;
            best = idx as u8;
        }
    }
    Ansi16::from_u8(best).unwrap_or(Ansi16::White)
}

bitflags! {
    /// Text attribute flags for a [`Style`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u8 {
        /// Bold (SGR 1).
        const BOLD = 1 << 0;
        /// Dim (SGR 2).
        const DIM = 1 << 1;
        /// Italic (SGR 3).
        const ITALIC = 1 << 2;
        /// Underline (SGR 4).
        const UNDERLINE = 1 << 3;
        /// Blink (SGR 5).
        const BLINK = 1 << 4;
        /// Reverse video (SGR 7).
        const REVERSE = 1 << 5;
        /// Strikethrough (SGR 9).
        const STRIKETHROUGH = 1 << 6;
    }
}

/// SGR attribute codes for each style flag, in bit order.
const FLAG_SGR: [(StyleFlags, u8); 7] = [
    (StyleFlags::BOLD, 1),
    (StyleFlags::DIM, 2),
    (StyleFlags::ITALIC, 3),
    (StyleFlags::UNDERLINE, 4),
    (StyleFlags::BLINK, 5),
    (StyleFlags::REVERSE, 7),
    (StyleFlags::STRIKETHROUGH, 9),
];

/// SGR reset sequence.
pub const SGR_RESET: &str = "\x1b[0m";

/// A compound style: optional foreground and background plus attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    fg: Option<Color>,
    bg: Option<Color>,
    flags: StyleFlags,
}

impl Style {
    /// Create an empty style.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fg: None,
            bg: None,
            flags: StyleFlags::empty(),
        }
    }

    /// Parse a style from a color name, as shorthand for a foreground-only style.
    ///
    /// # Errors
    ///
    /// Returns [`ColorError::UnknownName`] for unrecognized names.
    pub fn parse(name: &str) -> Result<Self, ColorError> {
        Ok(Self::new().fg(Color::parse(name)?))
    }

    /// Set the foreground color.
    #[must_use]
    pub const fn fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    /// Set the background color.
    #[must_use]
    pub const fn bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    /// Enable bold.
    #[must_use]
    pub const fn bold(mut self) -> Self {
        self.flags = self.flags.union(StyleFlags::BOLD);
        self
    }

    /// Enable underline.
    #[must_use]
    pub const fn underline(mut self) -> Self {
        self.flags = self.flags.union(StyleFlags::UNDERLINE);
        self
    }

    /// Enable reverse video.
    #[must_use]
    pub const fn reverse(mut self) -> Self {
        self.flags = self.flags.union(StyleFlags::REVERSE);
        self
    }

    /// Set the full attribute flags.
    #[must_use]
    pub const fn flags(mut self, flags: StyleFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether this style changes anything.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && self.flags.is_empty()
    }

    /// SGR "on" sequence for this style under `profile`.
    ///
    /// Colors the profile cannot represent are downgraded; under `Mono`
    /// only the attribute flags survive, and an entirely-color style
    /// yields an empty string.
    #[must_use]
    pub fn sgr(&self, profile: ColorProfile) -> String {
        let mut params = String::new();
        for (flag, code) in FLAG_SGR {
            if self.flags.contains(flag) {
                if !params.is_empty() {
                    params.push(';');
                }
                use std::fmt::Write as _;
                let _ = write!(params, "{code}");
            }
        }
        if let Some(fg) = self.fg.and_then(|c| c.downgrade(profile)) {
            if !params.is_empty() {
                params.push(';');
            }
            fg.push_sgr(&mut params, 38);
        }
        if let Some(bg) = self.bg.and_then(|c| c.downgrade(profile)) {
            if !params.is_empty() {
                params.push(';');
            }
            bg.push_sgr(&mut params, 48);
        }
        if params.is_empty() {
            String::new()
        } else {
            format!("\x1b[{params}m")
        }
    }

    /// Wrap `text` in this style's on/off sequences under `profile`.
    ///
    /// Returns the text unchanged when the style resolves to nothing.
    #[must_use]
    pub fn apply(&self, text: &str, profile: ColorProfile) -> String {
        let on = self.sgr(profile);
        if on.is_empty() {
            return text.to_string();
        }
        format!("{on}{text}{SGR_RESET}")
    }
}

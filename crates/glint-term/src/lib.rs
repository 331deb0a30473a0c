#![forbid(unsafe_code)]

//! Terminal plumbing for Glint.
//!
//! This crate owns the three terminal-facing concerns the rest of Glint
//! builds on:
//!
//! - [`surface`]: cached terminal geometry and pure control-sequence
//!   generation (cursor movement, scroll regions, erasing).
//! - [`color`]: the color model, terminal color-profile detection, and
//!   graceful downgrade from RGB to lesser palettes.
//! - [`width`]: printable-width measurement that ignores escape sequences,
//!   so colorized text can be laid out by its visible columns.
//!
//! Nothing in this crate writes to a stream. Sequence builders return bytes
//! or strings; the runtime crate stages and flushes them.

pub mod color;
pub mod surface;
pub mod width;

pub use color::{Ansi16, Color, ColorError, ColorProfile, Style, StyleFlags};
pub use surface::{Geometry, Surface};
pub use width::{is_single_column, printable_width, strip_sequences};

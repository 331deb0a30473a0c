#![forbid(unsafe_code)]

//! Widget text rendering for Glint.
//!
//! Everything in this crate is pure string computation: a renderer takes a
//! snapshot of widget state plus a target column width and returns a string
//! whose printable width is exactly that target. No I/O happens here; the
//! runtime crate positions and writes the result.
//!
//! - [`fields`]: the shared field model (reserved keys, user-supplied
//!   extras, `{name}` template rendering, fill expansion, justification).
//! - [`bar`]: progress bars and open-ended counters, including
//!   multi-segment bars driven by named subcounts.
//! - [`status`]: status lines with direct or formatted content.
//! - [`time`]: elapsed/eta clock formatting.

pub mod bar;
pub mod fields;
pub mod status;
pub mod time;

pub use bar::{BAR_FORMAT, BarRenderer, BarSnapshot, COUNTER_FORMAT, SERIES_STD, SegmentSnapshot};
pub use fields::{
    FILL_PLACEHOLDER, Fields, FormatError, FormatKind, Justify, RESERVED_FIELDS, expand_fill,
    render_template, validate_fill,
};
pub use status::{StatusRenderer, StatusSnapshot};
pub use time::format_duration;

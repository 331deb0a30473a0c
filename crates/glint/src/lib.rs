#![forbid(unsafe_code)]

//! Glint public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users. It
//! re-exports common types from internal crates and offers a lightweight
//! prelude for day-to-day usage.
//!
//! # Quick start
//!
//! ```no_run
//! use glint::prelude::*;
//!
//! fn main() -> glint::Result<()> {
//!     let manager = Manager::builder().build();
//!     let counter = manager.counter(CounterOptions::new().total(100.0).desc("work"))?;
//!     for _ in 0..100 {
//!         counter.update(1.0)?;
//!     }
//!     manager.stop();
//!     Ok(())
//! }
//! ```

// --- Terminal re-exports ---------------------------------------------------

pub use glint_term::{
    Ansi16, Color, ColorError, ColorProfile, Geometry, Style, StyleFlags, Surface,
    printable_width, strip_sequences,
};

// --- Widget re-exports -----------------------------------------------------

pub use glint_widgets::{
    BAR_FORMAT, BarRenderer, BarSnapshot, COUNTER_FORMAT, Fields, FormatError, FormatKind,
    Justify, SERIES_STD, SegmentSnapshot, StatusRenderer, StatusSnapshot, format_duration,
};

// --- Runtime re-exports ----------------------------------------------------

pub use glint_runtime::{
    Content, Counter, CounterOptions, DEFAULT_MIN_REFRESH, Error, LayoutError, Manager,
    ManagerOptions, ResizeMode, Result, StatusBar, StatusOptions, StreamTarget, TransferError,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Color, Content, Counter, CounterOptions, Justify, Manager, ManagerOptions, Result,
        StatusBar, StatusOptions, StreamTarget, Style,
    };

    pub use crate::{runtime, term, widgets};
}

pub use glint_runtime as runtime;
pub use glint_term as term;
pub use glint_widgets as widgets;

#![forbid(unsafe_code)]

//! Glint Runtime
//!
//! This crate owns the live layout of a terminal's bottom rows: which
//! widget sits at which offset, the shrinking scroll region protecting
//! ordinary output above them, and the batched frames that carry every
//! redraw to the stream as a single write.
//!
//! # Key Components
//!
//! - [`Manager`] - Orchestrator owning the streams, the row table, and
//!   the scroll region
//! - [`Counter`] / [`StatusBar`] - Widget handles tied to a manager
//! - [`FrameBuffer`] - Two-phase staging so a layout change flushes
//!   atomically
//! - [`ResizeLatch`] - SIGWINCH flag polled at operation boundaries
//! - [`slots`] - Pure bottom-up row assignment
//!
//! # Role in Glint
//! `glint-runtime` sits on top of `glint-term` (sequences, color,
//! width) and `glint-widgets` (formatting and rendering). It is the only
//! crate that performs I/O.

pub mod error;
pub mod frame;
pub mod manager;
pub mod resize;
pub mod slots;

pub use error::{Error, LayoutError, Result, TransferError};
pub use frame::FrameBuffer;
pub use manager::{
    Content, Counter, CounterOptions, DEFAULT_MIN_REFRESH, Manager, ManagerOptions, StatusBar,
    StatusOptions, StreamTarget,
};
pub use resize::{ResizeLatch, ResizeMode};
pub use slots::{LayoutPass, Move, SlotEntry, assign, validate_pin};

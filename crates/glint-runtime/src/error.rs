#![forbid(unsafe_code)]

//! Runtime error types.
//!
//! Configuration errors are raised synchronously at the offending call and
//! never leave partial state behind. Warnings (double close, reserved-field
//! shadowing) go through `tracing::warn!` instead of this module.

use std::fmt;
use std::io;

use glint_term::ColorError;
use glint_widgets::FormatError;

/// Invalid widget placement or an operation on an unmanaged widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Pin offset outside `1..=height`.
    PinOutOfRange { offset: u16, height: u16 },
    /// Pin offset already claimed by another pinned widget.
    PinOccupied { offset: u16 },
    /// The referenced widget is not managed by this manager.
    NotManaged,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinOutOfRange { offset, height } => {
                write!(
                    f,
                    "widget position {offset} is outside the terminal (height {height})"
                )
            }
            Self::PinOccupied { offset } => {
                write!(f, "widget position {offset} is already occupied")
            }
            Self::NotManaged => f.write_str("widget is not managed by this manager"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// A subcount transfer that would violate count conservation.
///
/// Transfers validate before mutating, so every variant implies all counts
/// are unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferError {
    /// The source cannot give up `requested`; it only holds `available`.
    Underflow {
        /// Source subcount name, or `None` for the parent's uncovered
        /// remainder.
        subcount: Option<String>,
        requested: f64,
        available: f64,
    },
    /// No subcount registered under this name.
    UnknownSubcount(String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Underflow {
                subcount,
                requested,
                available,
            } => {
                let source = subcount.as_deref().unwrap_or("parent remainder");
                write!(
                    f,
                    "cannot transfer {requested} from {source}: only {available} available"
                )
            }
            Self::UnknownSubcount(name) => write!(f, "unknown subcount '{name}'"),
        }
    }
}

impl std::error::Error for TransferError {}

/// Unified runtime error.
#[derive(Debug)]
pub enum Error {
    Layout(LayoutError),
    Format(FormatError),
    Color(ColorError),
    Transfer(TransferError),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layout(err) => err.fmt(f),
            Self::Format(err) => err.fmt(f),
            Self::Color(err) => err.fmt(f),
            Self::Transfer(err) => err.fmt(f),
            Self::Io(err) => write!(f, "stream write failed: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Layout(err) => Some(err),
            Self::Format(err) => Some(err),
            Self::Color(err) => Some(err),
            Self::Transfer(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<LayoutError> for Error {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Self::Format(err)
    }
}

impl From<ColorError> for Error {
    fn from(err: ColorError) -> Self {
        Self::Color(err)
    }
}

impl From<TransferError> for Error {
    fn from(err: TransferError) -> Self {
        Self::Transfer(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

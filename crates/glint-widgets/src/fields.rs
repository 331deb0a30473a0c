#![forbid(unsafe_code)]

//! Shared field model for widget formats.
//!
//! Templates use plain `{name}` placeholders. Every value is preformatted to
//! a string before substitution, so a template never carries width or
//! precision specs; renderers compute those (count padding, rate precision)
//! when they build the field set.
//!
//! Reserved field names belong to the renderers. User-supplied fields may
//! add new names but can never shadow a reserved one; a shadow attempt is
//! dropped with a warning rather than silently accepted.

use std::fmt;

use glint_term::{is_single_column, printable_width};

/// Field names computed by the renderers. User fields cannot use these.
pub const RESERVED_FIELDS: &[&str] = &[
    "count",
    "total",
    "desc",
    "unit",
    "elapsed",
    "rate",
    "eta",
    "percentage",
    "bar",
    "fill",
    "len_total",
    "desc_pad",
    "unit_pad",
];

/// Zero-width stand-in for `{bar}` and `{fill}` during the measuring pass.
///
/// NUL occupies no display columns, so a template rendered with this
/// placeholder measures to exactly the width of everything else; the
/// leftover becomes the bar or fill budget.
pub const FILL_PLACEHOLDER: char = '\u{0}';

/// Which format a rendering error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Bar,
    Counter,
    Status,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bar => f.write_str("bar format"),
            Self::Counter => f.write_str("counter format"),
            Self::Status => f.write_str("status format"),
        }
    }
}

/// Errors from template rendering and fill validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A `{name}` in the template has no binding.
    MissingField { field: String, kind: FormatKind },
    /// A fill string that does not render as a single column.
    InvalidFill(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field, kind } => {
                write!(f, "field '{field}' specified in {kind} but not provided")
            }
            Self::InvalidFill(fill) => {
                write!(
                    f,
                    "fill must print as a single column, got {fill:?} \
                     (width {})",
                    printable_width(fill)
                )
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Check that `fill` prints as exactly one column.
///
/// # Errors
///
/// Returns [`FormatError::InvalidFill`] for empty, multi-grapheme, or
/// wide fills. Escape sequences are allowed and do not count.
pub fn validate_fill(fill: &str) -> Result<(), FormatError> {
    if is_single_column(fill) {
        Ok(())
    } else {
        Err(FormatError::InvalidFill(fill.to_owned()))
    }
}

/// User-supplied extra fields, insertion ordered.
///
/// Values can be replaced after creation so a long-lived widget can show
/// dynamic fields. Reserved names are rejected at insert time.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    entries: Vec<(String, String)>,
}

impl Fields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Reserved names are dropped with a warning.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if RESERVED_FIELDS.contains(&name.as_str()) {
            tracing::warn!(field = %name, "ignoring reserved field specified as user field");
            return;
        }
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (name, value) in iter {
            fields.set(name, value);
        }
        fields
    }
}

/// Substitute `{name}` placeholders in `template`.
///
/// `{{` and `}}` are literal braces. Any other `{name}` is resolved through
/// `resolve`; a `None` result is a [`FormatError::MissingField`] tagged with
/// `kind`.
///
/// # Errors
///
/// [`FormatError::MissingField`] for an unresolvable name. An unmatched
/// `{` is treated as a missing empty field name.
pub fn render_template(
    template: &str,
    kind: FormatKind,
    resolve: impl Fn(&str) -> Option<String>,
) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        match ch {
            '{' => {
                if chars.peek().is_some_and(|&(_, c)| c == '{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let name_start = start + 1;
                let mut name_end = template.len();
                for (idx, c) in chars.by_ref() {
                    if c == '}' {
                        name_end = idx;
                        break;
                    }
                }
                let name = &template[name_start..name_end.min(template.len())];
                match resolve(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        return Err(FormatError::MissingField {
                            field: name.to_owned(),
                            kind,
                        });
                    }
                }
            }
            '}' => {
                if chars.peek().is_some_and(|&(_, c)| c == '}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(ch),
        }
    }
    Ok(out)
}

/// Replace [`FILL_PLACEHOLDER`] occurrences with fill characters so the
/// result measures exactly `width` printable columns.
///
/// Leftover columns are divided evenly across the occurrences; when the
/// division is uneven, the extra columns go to the occurrences closest to
/// the end of the string.
#[must_use]
pub fn expand_fill(text: &str, width: usize, fill: &str) -> String {
    let count = text.matches(FILL_PLACEHOLDER).count();
    if count == 0 {
        return text.to_owned();
    }

    let remaining = width.saturating_sub(printable_width(text));
    let base = remaining / count;
    let extra = remaining % count;

    let mut out = String::with_capacity(text.len() + remaining * fill.len());
    for (i, piece) in text.split(FILL_PLACEHOLDER).enumerate() {
        if i > 0 {
            let size = if i > count - extra { base + 1 } else { base };
            for _ in 0..size {
                out.push_str(fill);
            }
        }
        out.push_str(piece);
    }
    out
}

/// Text justification for status bars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Justify {
    #[default]
    Left,
    Center,
    Right,
}

impl Justify {
    /// Pad `text` with `fill` to `width` printable columns.
    ///
    /// Text already at or past the width is returned unchanged; the
    /// caller's clear-to-end-of-line handles anything shorter than a
    /// previous frame.
    #[must_use]
    pub fn apply(self, text: &str, width: usize, fill: &str) -> String {
        let current = printable_width(text);
        if current >= width {
            return text.to_owned();
        }
        let pad = width - current;
        let (left, right) = match self {
            Self::Left => (0, pad),
            Self::Right => (pad, 0),
            Self::Center => (pad / 2, pad - pad / 2),
        };
        let mut out = String::with_capacity(text.len() + pad * fill.len());
        for _ in 0..left {
            out.push_str(fill);
        }
        out.push_str(text);
        for _ in 0..right {
            out.push_str(fill);
        }
        out
    }
}

#![forbid(unsafe_code)]

//! Printable-width measurement.
//!
//! Widget text routinely carries SGR color sequences, which occupy bytes but
//! no columns. Layout math must budget by *visible* columns, so this module
//! strips escape sequences before measuring with Unicode display width.
//!
//! # Sequences recognized
//!
//! | Kind | Form | Terminator |
//! |------|------|------------|
//! | CSI  | `ESC [ params final` | byte in `0x40..=0x7e` |
//! | OSC  | `ESC ] ... ` | `BEL` or `ESC \` |
//! | Other | `ESC x` | the single following char |

use std::borrow::Cow;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ESC: u8 = 0x1b;

/// Strip ANSI escape sequences from `text`.
///
/// Returns a borrowed slice when there is nothing to strip.
#[must_use]
pub fn strip_sequences(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let Some(first) = memchr::memchr(ESC, bytes) else {
        return Cow::Borrowed(text);
    };

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..first]);
    let mut i = first;
    while i < bytes.len() {
        if bytes[i] != ESC {
            let start = i;
            let next = memchr::memchr(ESC, &bytes[start..])
                .map(|off| start + off)
                .unwrap_or(bytes.len());
            out.push_str(&text[start..next]);
            i = next;
            continue;
        }
        i += 1;
        match bytes.get(i) {
            Some(b'[') => {
                // CSI: skip to the final byte.
                i += 1;
                while i < bytes.len() && !(0x40..=0x7e).contains(&bytes[i]) {
                    i += 1;
                }
                if i < bytes.len() {
                    i += 1;
                }
            }
            Some(b']') => {
                // OSC: terminated by BEL or ST (ESC \).
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == ESC && bytes.get(i + 1) == Some(&b'\\') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            Some(_) => {
                // Two-byte escape (e.g. DECSC `ESC 7`). Skip one char.
                let rest = &text[i..];
                let skip = rest.chars().next().map_or(0, char::len_utf8);
                i += skip;
            }
            None => {}
        }
    }
    Cow::Owned(out)
}

/// Display-column width of `text` with escape sequences ignored.
#[must_use]
pub fn printable_width(text: &str) -> usize {
    strip_sequences(text).width()
}

/// Check that `text` renders as exactly one column.
///
/// Used to validate fill characters: a fill must be a single grapheme
/// occupying a single column once escape sequences are removed.
#[must_use]
pub fn is_single_column(text: &str) -> bool {
    let stripped = strip_sequences(text);
    stripped.graphemes(true).count() == 1 && stripped.width() == 1
}

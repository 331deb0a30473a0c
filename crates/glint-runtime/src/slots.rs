#![forbid(unsafe_code)]

//! Row slot assignment.
//!
//! Offsets count up from the bottom of the screen: offset 1 is the row
//! directly above the prompt, offset 2 the row above that. Pinned widgets
//! keep the offset they asked for; auto-placed widgets pack into the lowest
//! free offsets, most recently added first, so new work lands closest to
//! the prompt.
//!
//! Everything here is pure computation over a snapshot of the row table.
//! The manager applies the returned moves, clearing each moved widget at
//! its old row before redrawing at the new one.

use std::collections::BTreeSet;

use crate::error::LayoutError;

/// One row-table entry: widget identity plus current placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    pub id: u64,
    /// Current offset; 0 for a widget not yet placed.
    pub offset: u16,
    pub pinned: bool,
}

/// A widget whose offset changed during an assignment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub id: u64,
    pub old_offset: u16,
    pub new_offset: u16,
}

/// Result of one assignment pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPass {
    /// Widgets that must be cleared at `old_offset` and redrawn at
    /// `new_offset`, in the order they were reassigned.
    pub moves: Vec<Move>,
    /// Rows reserved at the bottom: `max(offsets) + 1`, or 1 when empty.
    pub scroll_offset: u16,
}

/// Validate a pin request against the current table.
///
/// Runs before any mutation so a rejected pin leaves the table untouched.
///
/// # Errors
///
/// [`LayoutError::PinOutOfRange`] for offsets outside `1..=height`,
/// [`LayoutError::PinOccupied`] when another pinned widget holds the
/// offset. Auto-placed widgets passing through the offset do not count
/// as occupancy; they will be packed around the pin.
pub fn validate_pin(entries: &[SlotEntry], offset: u16, height: u16) -> Result<(), LayoutError> {
    if offset < 1 || offset > height {
        return Err(LayoutError::PinOutOfRange { offset, height });
    }
    if entries.iter().any(|e| e.pinned && e.offset == offset) {
        return Err(LayoutError::PinOccupied { offset });
    }
    Ok(())
}

/// Recompute offsets for the whole table.
///
/// Pinned entries are untouched. Auto entries are walked newest first and
/// given the lowest free offsets, skipping pinned rows.
pub fn assign(entries: &mut [SlotEntry]) -> LayoutPass {
    let pinned: BTreeSet<u16> = entries
        .iter()
        .filter(|e| e.pinned)
        .map(|e| e.offset)
        .collect();

    let mut moves = Vec::new();
    let mut pos: u16 = 1;

    for entry in entries.iter_mut().rev() {
        if entry.pinned {
            continue;
        }
        while pinned.contains(&pos) {
            pos += 1;
        }
        if pos != entry.offset {
            moves.push(Move {
                id: entry.id,
                old_offset: entry.offset,
                new_offset: pos,
            });
            entry.offset = pos;
        }
        pos += 1;
    }

    let scroll_offset = entries.iter().map(|e| e.offset).max().unwrap_or(0) + 1;
    LayoutPass {
        moves,
        scroll_offset,
    }
}

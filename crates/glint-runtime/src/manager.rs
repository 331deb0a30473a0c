#![forbid(unsafe_code)]

//! The display manager.
//!
//! A [`Manager`] owns the bottom rows of a terminal. Widgets occupy
//! offsets counted up from the prompt row; ordinary output scrolls in a
//! shrinking region above them, maintained with DECSTBM. Every layout
//! change stages its clears, moves, and redraws into one frame and flushes
//! it as a single write.
//!
//! Widget handles ([`Counter`], [`StatusBar`]) hold a shared reference to
//! the manager core plus an id, so a widget never outlives or escapes its
//! manager. All mutation is single-threaded through the core; the only
//! asynchronous input is the resize latch, which is polled and applied at
//! operation boundaries.
//!
//! A manager whose stream is not a terminal starts disabled: every
//! operation is accepted and tracked, nothing is written.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::io::{self, IsTerminal, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use glint_term::{ColorProfile, Geometry, Style, Surface};
use glint_widgets::{
    BarRenderer, BarSnapshot, Fields, Justify, SegmentSnapshot, StatusRenderer, StatusSnapshot,
    validate_fill,
};

use crate::error::{Error, LayoutError, Result, TransferError};
use crate::frame::FrameBuffer;
use crate::resize::{ResizeLatch, ResizeMode};
use crate::slots::{self, SlotEntry};

/// Default minimum interval between redraws of one widget.
pub const DEFAULT_MIN_REFRESH: Duration = Duration::from_millis(100);

/// Output to write at a row: either a finished string or a thunk invoked
/// at the moment of writing.
///
/// The deferred form skips string construction entirely when the manager
/// is disabled. The thunk runs while the manager is mid-write, so it must
/// only produce a string; calling back into the manager or a widget
/// handle from inside it panics.
pub enum Content {
    Text(String),
    Deferred(Box<dyn FnOnce() -> String>),
}

impl Content {
    fn resolve(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Deferred(thunk) => thunk(),
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// Where the manager writes.
pub enum StreamTarget {
    Stdout,
    Stderr,
    /// Arbitrary sink. Not a terminal, so pair it with
    /// [`ManagerOptions::geometry`] and [`ManagerOptions::enabled`].
    Custom(Box<dyn Write>),
}

/// Manager construction options.
///
/// `Manager::builder().geometry(..).enabled(true).build()` style; every
/// option has a sensible terminal-backed default.
pub struct ManagerOptions {
    target: StreamTarget,
    companion: bool,
    set_scroll: bool,
    no_resize: bool,
    resize_mode: ResizeMode,
    width: Option<u16>,
    geometry: Option<Geometry>,
    enabled: Option<bool>,
    profile: Option<ColorProfile>,
    leave: bool,
    min_refresh: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            target: StreamTarget::Stdout,
            companion: true,
            set_scroll: true,
            no_resize: false,
            resize_mode: ResizeMode::Immediate,
            width: None,
            geometry: None,
            enabled: None,
            profile: None,
            leave: true,
            min_refresh: DEFAULT_MIN_REFRESH,
        }
    }
}

impl ManagerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stream(mut self, target: StreamTarget) -> Self {
        self.target = target;
        self
    }

    /// Keep a companion stream's cursor in sync (stderr when the primary
    /// is stdout, and vice versa). Ignored for custom sinks.
    #[must_use]
    pub fn companion(mut self, companion: bool) -> Self {
        self.companion = companion;
        self
    }

    /// Disable scroll-region management; widgets still draw but ordinary
    /// output is not protected.
    #[must_use]
    pub fn set_scroll(mut self, set_scroll: bool) -> Self {
        self.set_scroll = set_scroll;
        self
    }

    #[must_use]
    pub fn no_resize(mut self, no_resize: bool) -> Self {
        self.no_resize = no_resize;
        self
    }

    /// Choose deferred resize handling when multiple threads or processes
    /// share the terminal. Fixed at construction.
    #[must_use]
    pub fn resize_mode(mut self, mode: ResizeMode) -> Self {
        self.resize_mode = mode;
        self
    }

    /// Static output width, overriding probed geometry.
    #[must_use]
    pub fn width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    /// Fixed geometry; disables probing. Intended for custom sinks and
    /// tests.
    #[must_use]
    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Force the enabled state instead of deriving it from the stream's
    /// terminal status.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn profile(mut self, profile: ColorProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Default `leave` for widgets created through this manager.
    #[must_use]
    pub fn leave(mut self, leave: bool) -> Self {
        self.leave = leave;
        self
    }

    /// Default minimum refresh interval for widgets.
    #[must_use]
    pub fn min_refresh(mut self, min_refresh: Duration) -> Self {
        self.min_refresh = min_refresh;
        self
    }

    #[must_use]
    pub fn build(self) -> Manager {
        let tty = match &self.target {
            StreamTarget::Stdout => io::stdout().is_terminal(),
            StreamTarget::Stderr => io::stderr().is_terminal(),
            StreamTarget::Custom(_) => false,
        };
        let enabled = self.enabled.unwrap_or(tty);

        let (stream, companion): (Box<dyn Write>, Option<Box<dyn Write>>) = match self.target {
            StreamTarget::Stdout => {
                let companion: Option<Box<dyn Write>> = if self.companion
                    && io::stderr().is_terminal()
                {
                    Some(Box::new(io::stderr()))
                } else {
                    None
                };
                (Box::new(io::stdout()), companion)
            }
            StreamTarget::Stderr => {
                let companion: Option<Box<dyn Write>> = if self.companion
                    && io::stdout().is_terminal()
                {
                    Some(Box::new(io::stdout()))
                } else {
                    None
                };
                (Box::new(io::stderr()), companion)
            }
            StreamTarget::Custom(sink) => (sink, None),
        };

        let mut surface = match self.geometry {
            Some(geometry) => Surface::with_geometry(geometry),
            None => Surface::new(tty),
        }
        .with_width_override(self.width);
        if let Some(profile) = self.profile {
            surface = surface.with_profile(profile);
        }

        let height = surface.height();
        let width = surface.width();

        Manager {
            core: Rc::new(RefCell::new(Core {
                stream,
                companion,
                surface,
                frame: FrameBuffer::new(),
                widgets: Vec::new(),
                next_id: 1,
                enabled,
                set_scroll: self.set_scroll,
                no_resize: self.no_resize,
                resize_mode: self.resize_mode,
                latch: ResizeLatch::new(),
                lifecycle: Lifecycle::Uninitialized,
                scroll_offset: 1,
                height,
                width,
                refresh_lock: Rc::new(Cell::new(false)),
                resize_lock: Rc::new(Cell::new(false)),
                default_leave: self.leave,
                default_min_refresh: self.min_refresh,
            })),
        }
    }
}

/// Options for [`Manager::counter`].
#[derive(Default)]
pub struct CounterOptions {
    desc: String,
    unit: String,
    total: Option<f64>,
    count: f64,
    position: Option<u16>,
    autorefresh: bool,
    leave: Option<bool>,
    min_refresh: Option<Duration>,
    style: Option<Style>,
    series: Option<Vec<char>>,
    bar_format: Option<String>,
    counter_format: Option<String>,
    fill: Option<String>,
    fields: Fields,
}

impl CounterOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    #[must_use]
    pub fn total(mut self, total: f64) -> Self {
        self.total = Some(total);
        self
    }

    #[must_use]
    pub fn count(mut self, count: f64) -> Self {
        self.count = count;
        self
    }

    /// Pin the counter to a fixed row offset from the bottom.
    #[must_use]
    pub fn position(mut self, position: u16) -> Self {
        self.position = Some(position);
        self
    }

    /// Redraw this counter whenever a sibling redraws.
    #[must_use]
    pub fn autorefresh(mut self, autorefresh: bool) -> Self {
        self.autorefresh = autorefresh;
        self
    }

    #[must_use]
    pub fn leave(mut self, leave: bool) -> Self {
        self.leave = Some(leave);
        self
    }

    #[must_use]
    pub fn min_refresh(mut self, min_refresh: Duration) -> Self {
        self.min_refresh = Some(min_refresh);
        self
    }

    #[must_use]
    pub fn style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    #[must_use]
    pub fn series(mut self, series: impl IntoIterator<Item = char>) -> Self {
        self.series = Some(series.into_iter().collect());
        self
    }

    #[must_use]
    pub fn bar_format(mut self, format: impl Into<String>) -> Self {
        self.bar_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn counter_format(mut self, format: impl Into<String>) -> Self {
        self.counter_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.set(name, value);
        self
    }
}

/// Options for [`Manager::status_bar`].
#[derive(Default)]
pub struct StatusOptions {
    message: Option<String>,
    status_format: Option<String>,
    justify: Justify,
    position: Option<u16>,
    autorefresh: bool,
    leave: Option<bool>,
    min_refresh: Option<Duration>,
    style: Option<Style>,
    fill: Option<String>,
    fields: Fields,
}

impl StatusOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct content; takes precedence over `status_format`.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn status_format(mut self, format: impl Into<String>) -> Self {
        self.status_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn justify(mut self, justify: Justify) -> Self {
        self.justify = justify;
        self
    }

    #[must_use]
    pub fn position(mut self, position: u16) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn autorefresh(mut self, autorefresh: bool) -> Self {
        self.autorefresh = autorefresh;
        self
    }

    #[must_use]
    pub fn leave(mut self, leave: bool) -> Self {
        self.leave = Some(leave);
        self
    }

    #[must_use]
    pub fn min_refresh(mut self, min_refresh: Duration) -> Self {
        self.min_refresh = Some(min_refresh);
        self
    }

    #[must_use]
    pub fn style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    #[must_use]
    pub fn fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.set(name, value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Active,
    Stopped,
}

#[derive(Debug, Clone)]
struct SubCount {
    name: String,
    count: f64,
    style: Style,
}

enum WidgetKind {
    Counter {
        count: f64,
        start_count: f64,
        total: Option<f64>,
        desc: String,
        unit: String,
        renderer: BarRenderer,
        subcounts: Vec<SubCount>,
    },
    Status {
        message: Option<String>,
        renderer: StatusRenderer,
    },
}

struct WidgetState {
    id: u64,
    offset: u16,
    pinned: bool,
    enabled: bool,
    leave: bool,
    closed: bool,
    autorefresh: bool,
    min_refresh: Duration,
    start: Instant,
    last_update: Instant,
    count_updated: Instant,
    fields: Fields,
    kind: WidgetKind,
}

impl WidgetState {
    /// Elapsed seconds; the clock freezes at the moment the count reached
    /// the total.
    fn elapsed_secs(&self, now: Instant) -> f64 {
        if let WidgetKind::Counter {
            count,
            total: Some(total),
            ..
        } = &self.kind
            && count == total
        {
            return self
                .count_updated
                .saturating_duration_since(self.start)
                .as_secs_f64();
        }
        now.saturating_duration_since(self.start).as_secs_f64()
    }
}

/// RAII reentrancy flag: cleared on every exit path.
struct ReentryGuard {
    flag: Rc<Cell<bool>>,
}

impl ReentryGuard {
    fn acquire(flag: &Rc<Cell<bool>>) -> Option<Self> {
        if flag.get() {
            None
        } else {
            flag.set(true);
            Some(Self {
                flag: Rc::clone(flag),
            })
        }
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

struct Core {
    stream: Box<dyn Write>,
    companion: Option<Box<dyn Write>>,
    surface: Surface,
    frame: FrameBuffer,
    widgets: Vec<WidgetState>,
    next_id: u64,
    enabled: bool,
    set_scroll: bool,
    no_resize: bool,
    resize_mode: ResizeMode,
    latch: ResizeLatch,
    lifecycle: Lifecycle,
    scroll_offset: u16,
    height: u16,
    width: u16,
    refresh_lock: Rc<Cell<bool>>,
    resize_lock: Rc<Cell<bool>>,
    default_leave: bool,
    default_min_refresh: Duration,
}

impl Core {
    fn index_of(&self, id: u64) -> Option<usize> {
        self.widgets.iter().position(|w| w.id == id)
    }

    fn entries(&self) -> Vec<SlotEntry> {
        self.widgets
            .iter()
            .map(|w| SlotEntry {
                id: w.id,
                offset: w.offset,
                pinned: w.pinned,
            })
            .collect()
    }

    /// Apply a latched resize if this call site is responsible for it.
    ///
    /// Mid-pass polls leave the latch alone so a resize arriving during a
    /// relayout is picked up by the running pass's final re-check.
    fn poll_resize(&mut self, at_write: bool) {
        if self.lifecycle != Lifecycle::Active
            || self.resize_lock.get()
            || self.refresh_lock.get()
        {
            return;
        }
        let applies = match self.resize_mode {
            ResizeMode::Immediate => true,
            ResizeMode::Deferred => at_write,
        };
        if applies && self.latch.take() {
            self.handle_resize();
        }
    }

    fn handle_resize(&mut self) {
        // A latch set mid-pass is folded into this pass's re-check
        // instead of nesting.
        let Some(_guard) = ReentryGuard::acquire(&self.resize_lock) else {
            return;
        };
        loop {
            self.apply_resize();
            if !self.latch.take() {
                break;
            }
        }
    }

    fn apply_resize(&mut self) {
        let _span = tracing::debug_span!("resize").entered();
        let old_width = self.width;

        // Re-probe until the reported geometry stops changing; a drag
        // resize delivers a burst of intermediate sizes.
        self.surface.invalidate();
        let mut height = self.surface.height();
        let mut width = self.surface.width();
        loop {
            self.surface.invalidate();
            let (next_height, next_width) = (self.surface.height(), self.surface.width());
            if next_height == height && next_width == width {
                break;
            }
            height = next_height;
            width = next_width;
        }

        tracing::debug!(height, width, "applying terminal resize");

        if width < old_width {
            // Narrowing wraps the old widget rows; clear everything from
            // where the tallest wrapped row could start.
            let wrap = 1 + u32::from(old_width) / u32::from(width.max(1));
            let reserved = u32::from(self.scroll_offset.saturating_sub(1)) * wrap;
            let row = u32::from(height)
                .saturating_sub(reserved)
                .saturating_add(1)
                .min(u32::from(height.max(1))) as u16;
            self.frame.stage(self.surface.move_to(row, 1));
            self.frame.stage(self.surface.clear_eos());
        }

        self.width = width;
        self.set_scroll_area(true);

        let ids: Vec<u64> = self.widgets.iter().map(|w| w.id).collect();
        for id in ids {
            if let Err(err) = self.refresh_widget(id, false) {
                tracing::warn!(error = %err, "widget refresh failed during resize");
            }
        }
        if let Err(err) = self.flush() {
            tracing::warn!(error = %err, "flush failed during resize");
        }
    }

    /// Recompute `scroll_offset` and restore the scroll region and parked
    /// cursor. Stages only; the caller flushes.
    fn set_scroll_area(&mut self, force: bool) {
        let old_offset = self.scroll_offset;
        let new_offset = self.widgets.iter().map(|w| w.offset).max().unwrap_or(0) + 1;
        self.scroll_offset = new_offset;

        if !self.enabled {
            return;
        }

        self.ensure_active();

        if self.set_scroll {
            let height = self.surface.height();
            let park_row = height.saturating_sub(new_offset) + 1;

            if force || new_offset > old_offset || height != self.height {
                self.height = height;

                // Feed lines first so existing output is not overwritten
                // by the growing widget area.
                if new_offset > old_offset {
                    let row = height.saturating_sub(old_offset) + 1;
                    self.frame.stage(self.surface.move_to(row, 1));
                    for _ in 0..(new_offset - old_offset) {
                        self.frame.stage(self.surface.feed_line());
                    }
                }
                self.frame
                    .stage(self.surface.set_scroll_region(1, park_row));
            }

            self.frame.stage(self.surface.move_to(park_row, 1));
            if self.companion.is_some() {
                self.frame
                    .stage_companion(self.surface.move_to(park_row, 1));
            }
        }
    }

    /// First layout change: register the resize latch, exactly once.
    fn ensure_active(&mut self) {
        if self.lifecycle == Lifecycle::Uninitialized {
            if !self.no_resize
                && let Err(err) = self.latch.register()
            {
                tracing::warn!(error = %err, "resize signal registration failed");
            }
            self.lifecycle = Lifecycle::Active;
            tracing::debug!("display manager active");
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let companion = self
            .companion
            .as_mut()
            .map(|stream| stream.as_mut() as &mut dyn Write);
        self.frame.flush(self.stream.as_mut(), companion)
    }

    fn flush_lossy(&mut self) {
        let companion = self
            .companion
            .as_mut()
            .map(|stream| stream.as_mut() as &mut dyn Write);
        self.frame.flush_lossy(self.stream.as_mut(), companion);
    }

    /// The primitive redraw: position, clear the row, write.
    fn write_at(
        &mut self,
        position: u16,
        content: Content,
        flush: bool,
        exclude: Option<u64>,
    ) -> Result<()> {
        self.poll_resize(true);
        if !self.enabled {
            return Ok(());
        }

        let height = self.surface.height();
        let row = height.saturating_sub(position) + 1;
        self.frame.stage(self.surface.move_to(row.min(height), 1));
        self.frame.stage("\r");
        self.frame.stage(self.surface.clear_eol());
        self.frame.stage(content.resolve());

        // Inside a refresh cascade the triggering write already owns the
        // scroll restore and flush.
        if !self.refresh_lock.get() {
            self.autorefresh_pass(exclude);
            self.set_scroll_area(false);
            if flush {
                self.flush()?;
            }
        }
        Ok(())
    }

    /// Stage a clear of one row without touching widget state.
    fn stage_clear_row(&mut self, position: u16) {
        if !self.enabled || position == 0 {
            return;
        }
        let height = self.surface.height();
        let row = height.saturating_sub(position) + 1;
        self.frame.stage(self.surface.move_to(row.min(height), 1));
        self.frame.stage("\r");
        self.frame.stage(self.surface.clear_eol());
    }

    fn autorefresh_pass(&mut self, exclude: Option<u64>) {
        let Some(_guard) = ReentryGuard::acquire(&self.refresh_lock) else {
            return;
        };
        let now = Instant::now();
        let due: Vec<u64> = self
            .widgets
            .iter()
            .filter(|w| {
                w.autorefresh
                    && Some(w.id) != exclude
                    && now.saturating_duration_since(w.last_update) >= w.min_refresh
            })
            .map(|w| w.id)
            .collect();
        for id in due {
            if let Err(err) = self.refresh_widget(id, true) {
                tracing::warn!(error = %err, "auto-refresh failed");
            }
        }
    }

    fn render_widget(&mut self, idx: usize) -> Result<String> {
        let width = self.surface.width() as usize;
        let now = Instant::now();
        let widget = &self.widgets[idx];
        let elapsed = widget.elapsed_secs(now);

        match &widget.kind {
            WidgetKind::Counter {
                count,
                start_count,
                total,
                desc,
                unit,
                renderer,
                subcounts,
            } => {
                let snapshot = BarSnapshot {
                    count: *count,
                    start_count: *start_count,
                    total: *total,
                    desc: desc.clone(),
                    unit: unit.clone(),
                    elapsed,
                    subcounts: subcounts
                        .iter()
                        .map(|sub| SegmentSnapshot {
                            count: sub.count,
                            style: sub.style,
                        })
                        .collect(),
                };
                Ok(renderer.render(&snapshot, &widget.fields, width)?)
            }
            WidgetKind::Status { message, renderer } => {
                let snapshot = StatusSnapshot {
                    message: message.clone(),
                    elapsed,
                };
                Ok(renderer.render(&snapshot, &widget.fields, width)?)
            }
        }
    }

    fn refresh_widget(&mut self, id: u64, flush: bool) -> Result<()> {
        let Some(idx) = self.index_of(id) else {
            return Ok(());
        };
        if !self.enabled || !self.widgets[idx].enabled {
            return Ok(());
        }
        self.widgets[idx].last_update = Instant::now();
        let position = self.widgets[idx].offset;
        let text = self.render_widget(idx)?;
        self.write_at(position, Content::Text(text), flush, Some(id))
    }

    fn clear_widget(&mut self, id: u64, flush: bool) -> Result<()> {
        let Some(idx) = self.index_of(id) else {
            return Ok(());
        };
        if !self.enabled || !self.widgets[idx].enabled {
            return Ok(());
        }
        // Make the widget due immediately on the next autorefresh pass.
        let min_refresh = self.widgets[idx].min_refresh;
        let now = Instant::now();
        self.widgets[idx].last_update = now.checked_sub(min_refresh).unwrap_or(now);
        let position = self.widgets[idx].offset;
        self.write_at(position, Content::Text(String::new()), flush, Some(id))
    }

    /// Shared tail of widget creation, replacement, and removal: repack
    /// auto offsets, clear and redraw every bumped widget, restore the
    /// scroll region, flush once.
    fn relayout(&mut self, new_id: Option<u64>, mut to_refresh: Vec<u64>) -> Result<()> {
        let _span = tracing::debug_span!("relayout", widgets = self.widgets.len()).entered();
        let mut entries = self.entries();
        let pass = slots::assign(&mut entries);

        for mv in &pass.moves {
            if Some(mv.id) != new_id {
                self.stage_clear_row(mv.old_offset);
                to_refresh.push(mv.id);
            }
            if let Some(idx) = self.index_of(mv.id) {
                self.widgets[idx].offset = mv.new_offset;
            }
        }

        self.set_scroll_area(false);
        for id in to_refresh.iter().rev() {
            self.refresh_widget(*id, false)?;
        }
        self.flush()?;
        Ok(())
    }

    fn add_widget(
        &mut self,
        position: Option<u16>,
        replace: Option<u64>,
        mut widget: WidgetState,
        draw_now: bool,
    ) -> Result<u64> {
        let id = widget.id;

        if let Some(old_id) = replace {
            // Atomic swap: the new widget takes the old one's row and pin
            // before any relayout runs, so the row never goes free.
            let Some(old_idx) = self.index_of(old_id) else {
                return Err(LayoutError::NotManaged.into());
            };
            let old = &mut self.widgets[old_idx];
            if old.closed {
                tracing::warn!(id = old_id, "replacing an already closed widget");
            }
            widget.offset = old.offset;
            widget.pinned = old.pinned;
            self.widgets.remove(old_idx);
        } else if let Some(offset) = position {
            let height = self.surface.height();
            slots::validate_pin(&self.entries(), offset, height)?;
            widget.offset = offset;
            widget.pinned = true;
        }

        self.widgets.push(widget);

        let to_refresh = if draw_now { vec![id] } else { Vec::new() };
        self.relayout(Some(id), to_refresh)?;
        Ok(id)
    }

    /// Drop a widget from the row table unless it wants its last frame
    /// left on screen. Unmanaged ids are a no-op.
    fn remove_widget(&mut self, id: u64) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        if self.widgets[idx].leave {
            return;
        }
        self.widgets.remove(idx);
        if let Err(err) = self.relayout(None, Vec::new()) {
            tracing::warn!(error = %err, "relayout after removal failed");
        }
    }

    fn close_widget(&mut self, id: u64) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        if self.widgets[idx].closed {
            tracing::warn!(id, "closing already closed widget");
            self.widgets[idx].closed = true;
            return;
        }
        self.widgets[idx].closed = true;

        let result = if self.widgets[idx].leave {
            self.refresh_widget(id, true)
        } else {
            self.clear_widget(id, true)
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "final draw on close failed");
        }
        self.remove_widget(id);
    }

    fn update_counter(
        &mut self,
        id: u64,
        incr: f64,
        subcount: Option<&str>,
        force: bool,
    ) -> Result<()> {
        let Some(idx) = self.index_of(id) else {
            tracing::warn!(id, "update on unmanaged counter ignored");
            return Ok(());
        };

        let now = Instant::now();
        let widget = &mut self.widgets[idx];
        let WidgetKind::Counter {
            count,
            total,
            subcounts,
            ..
        } = &mut widget.kind
        else {
            return Ok(());
        };

        if let Some(name) = subcount {
            let Some(sub) = subcounts.iter_mut().find(|s| s.name == name) else {
                return Err(Error::Transfer(TransferError::UnknownSubcount(
                    name.to_owned(),
                )));
            };
            sub.count += incr;
        }
        *count += incr;
        widget.count_updated = now;

        let complete = total.is_some_and(|t| t == *count);
        let due = now.saturating_duration_since(widget.last_update) >= widget.min_refresh;
        if self.enabled && widget.enabled && (force || complete || due) {
            self.refresh_widget(id, true)?;
        }
        Ok(())
    }

    /// Move `amount` between two subcounts, or between a subcount and the
    /// parent's uncovered remainder (`None`). Validates fully before
    /// mutating; on error all counts are unchanged.
    fn transfer(
        &mut self,
        id: u64,
        from: Option<&str>,
        to: Option<&str>,
        amount: f64,
    ) -> Result<()> {
        let Some(idx) = self.index_of(id) else {
            return Err(LayoutError::NotManaged.into());
        };
        let WidgetKind::Counter {
            count, subcounts, ..
        } = &mut self.widgets[idx].kind
        else {
            return Err(LayoutError::NotManaged.into());
        };

        let covered: f64 = subcounts.iter().map(|s| s.count).sum();

        let available = match from {
            Some(name) => {
                subcounts
                    .iter()
                    .find(|s| s.name == name)
                    .ok_or_else(|| TransferError::UnknownSubcount(name.to_owned()))?
                    .count
            }
            None => *count - covered,
        };
        if available < amount {
            return Err(TransferError::Underflow {
                subcount: from.map(str::to_owned),
                requested: amount,
                available,
            }
            .into());
        }
        if let Some(name) = to
            && !subcounts.iter().any(|s| s.name == name)
        {
            return Err(TransferError::UnknownSubcount(name.to_owned()).into());
        }

        if let Some(name) = from
            && let Some(sub) = subcounts.iter_mut().find(|s| s.name == name)
        {
            sub.count -= amount;
        }
        if let Some(name) = to
            && let Some(sub) = subcounts.iter_mut().find(|s| s.name == name)
        {
            sub.count += amount;
        }
        Ok(())
    }

    /// Teardown: restore the terminal, disable everything, leave only
    /// widgets that asked to stay. Idempotent; I/O errors are swallowed.
    fn stop(&mut self) {
        if self.lifecycle == Lifecycle::Stopped {
            return;
        }
        if !self.enabled {
            self.lifecycle = Lifecycle::Stopped;
            return;
        }

        self.latch.unregister();

        let height = self.surface.height();
        let occupied: BTreeSet<u16> = self.widgets.iter().map(|w| w.offset).collect();

        // Clear reserved rows no widget owns any longer, top-down.
        for offset in (1..self.scroll_offset).rev() {
            if !occupied.contains(&offset) {
                let row = height.saturating_sub(offset) + 1;
                self.frame.stage(self.surface.move_to(row, 1));
                self.frame.stage(self.surface.clear_eol());
            }
        }

        if self.set_scroll {
            self.frame.stage(self.surface.reset_scroll_region());
            self.frame.stage(self.surface.move_to(height, 1));
            self.frame.stage(self.surface.show_cursor());
            if self.companion.is_some() {
                self.frame
                    .stage_companion(self.surface.reset_scroll_region());
                self.frame.stage_companion(self.surface.move_to(height, 1));
            }
        } else {
            self.frame.stage(self.surface.move_to(height, 1));
        }

        // Don't let the shell prompt land on the bottom widget.
        if occupied.contains(&1) {
            self.frame.stage(self.surface.feed_line());
        }

        self.enabled = false;
        for widget in &mut self.widgets {
            widget.enabled = false;
        }
        self.lifecycle = Lifecycle::Stopped;

        self.flush_lossy();
        tracing::debug!("display manager stopped");
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        if self.lifecycle == Lifecycle::Active {
            self.stop();
        }
    }
}

/// Orchestrator handle. Cheap to clone through widget handles; all state
/// lives in the shared core.
pub struct Manager {
    core: Rc<RefCell<Core>>,
}

impl Manager {
    /// Start building a manager.
    #[must_use]
    pub fn builder() -> ManagerOptions {
        ManagerOptions::new()
    }

    /// Create an auto-placed or pinned progress counter.
    ///
    /// Counters are not drawn at creation since subcounters may still be
    /// added; call [`Counter::refresh`] to draw before the first update.
    ///
    /// # Errors
    ///
    /// [`LayoutError`] for an invalid or colliding pin; the row table is
    /// unchanged on error.
    pub fn counter(&self, options: CounterOptions) -> Result<Counter> {
        self.add_counter(options, None)
    }

    /// Replace `old` with a new counter at the same offset, preserving pin
    /// status. The old widget is dropped from the table regardless of its
    /// `leave` setting.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotManaged`] when `old` is not in the row table.
    pub fn replace(&self, old: &Counter, options: CounterOptions) -> Result<Counter> {
        self.add_counter(options, Some(old.id))
    }

    fn add_counter(&self, options: CounterOptions, replace: Option<u64>) -> Result<Counter> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);

        if let Some(fill) = &options.fill {
            validate_fill(fill)?;
        }

        let mut renderer = BarRenderer::new(core.surface.profile());
        renderer.style = options.style;
        if let Some(series) = options.series {
            renderer.series = series;
        }
        if let Some(format) = options.bar_format {
            renderer.bar_format = format;
        }
        if let Some(format) = options.counter_format {
            renderer.counter_format = format;
        }
        if let Some(fill) = options.fill {
            renderer.fill = fill;
        }

        let now = Instant::now();
        let id = core.next_id;
        core.next_id += 1;
        let widget = WidgetState {
            id,
            offset: 0,
            pinned: false,
            enabled: core.enabled,
            leave: options.leave.unwrap_or(core.default_leave),
            closed: false,
            autorefresh: options.autorefresh,
            min_refresh: options.min_refresh.unwrap_or(core.default_min_refresh),
            start: now,
            last_update: now,
            count_updated: now,
            fields: options.fields,
            kind: WidgetKind::Counter {
                count: options.count,
                start_count: options.count,
                total: options.total,
                desc: options.desc,
                unit: options.unit,
                renderer,
                subcounts: Vec::new(),
            },
        };

        core.add_widget(options.position, replace, widget, false)?;
        Ok(Counter {
            core: Rc::clone(&self.core),
            id,
        })
    }

    /// Create an auto-placed or pinned status bar. Status bars are drawn
    /// immediately.
    ///
    /// # Errors
    ///
    /// [`LayoutError`] for an invalid or colliding pin, [`FormatError`]
    /// from the first draw.
    ///
    /// [`FormatError`]: glint_widgets::FormatError
    pub fn status_bar(&self, options: StatusOptions) -> Result<StatusBar> {
        self.add_status_bar(options, None)
    }

    /// Replace `old` with a new status bar at the same offset, preserving
    /// pin status.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotManaged`] when `old` is not in the row table.
    pub fn replace_status_bar(&self, old: &StatusBar, options: StatusOptions) -> Result<StatusBar> {
        self.add_status_bar(options, Some(old.id))
    }

    fn add_status_bar(&self, options: StatusOptions, replace: Option<u64>) -> Result<StatusBar> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);

        if let Some(fill) = &options.fill {
            validate_fill(fill)?;
        }

        let mut renderer = StatusRenderer::new(core.surface.profile());
        renderer.status_format = options.status_format;
        renderer.justify = options.justify;
        renderer.style = options.style;
        if let Some(fill) = options.fill {
            renderer.fill = fill;
        }

        let now = Instant::now();
        let id = core.next_id;
        core.next_id += 1;
        let widget = WidgetState {
            id,
            offset: 0,
            pinned: false,
            enabled: core.enabled,
            leave: options.leave.unwrap_or(core.default_leave),
            closed: false,
            autorefresh: options.autorefresh,
            min_refresh: options.min_refresh.unwrap_or(core.default_min_refresh),
            start: now,
            last_update: now,
            count_updated: now,
            fields: options.fields,
            kind: WidgetKind::Status {
                message: options.message,
                renderer,
            },
        };

        core.add_widget(options.position, replace, widget, true)?;
        Ok(StatusBar {
            core: Rc::clone(&self.core),
            id,
        })
    }

    /// Remove a counter from the row table. Honors `leave`; unmanaged
    /// handles are a no-op.
    pub fn remove(&self, counter: &Counter) {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.remove_widget(counter.id);
    }

    /// Remove a status bar from the row table. Honors `leave`; unmanaged
    /// handles are a no-op.
    pub fn remove_status_bar(&self, bar: &StatusBar) {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.remove_widget(bar.id);
    }

    /// Write arbitrary content at a row offset from the bottom.
    ///
    /// Deferred content is only rendered if the manager is enabled, and
    /// must not call back into this manager (see [`Content`]).
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the flush fails.
    pub fn write_at(&self, position: u16, content: Content) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.write_at(position, content, true, None)
    }

    /// Restore the terminal and disable the manager and all widgets.
    ///
    /// Idempotent. Teardown I/O errors are swallowed; a stopped manager
    /// cannot be reactivated.
    pub fn stop(&self) {
        self.core.borrow_mut().stop();
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.core.borrow().enabled
    }

    /// Rows currently reserved at the bottom of the screen.
    #[must_use]
    pub fn scroll_offset(&self) -> u16 {
        self.core.borrow().scroll_offset
    }

    /// Latch a resize as if SIGWINCH had fired. Applied at the next
    /// operation boundary according to the resize mode.
    pub fn notify_resize(&self) {
        self.core.borrow().latch.set();
    }
}

/// Progress bar / counter handle.
pub struct Counter {
    core: Rc<RefCell<Core>>,
    id: u64,
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter").field("id", &self.id).finish()
    }
}

impl Counter {
    /// Advance the count and redraw when forced, complete, or past the
    /// minimum refresh interval.
    ///
    /// # Errors
    ///
    /// [`Error::Transfer`] for an unknown subcount name, [`Error::Format`]
    /// or [`Error::Io`] from the redraw.
    pub fn update(&self, incr: f64) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.update_counter(self.id, incr, None, false)
    }

    /// [`update`](Self::update) bypassing the refresh interval.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub fn update_force(&self, incr: f64) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.update_counter(self.id, incr, None, true)
    }

    /// Advance a named subcount along with the parent count.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub fn update_subcount(&self, name: &str, incr: f64) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.update_counter(self.id, incr, Some(name), false)
    }

    /// Register a named subcount rendered as a colored bar segment.
    /// Duplicate names are ignored with a warning.
    pub fn add_subcounter(&self, name: &str, style: Style) {
        let mut core = self.core.borrow_mut();
        let Some(idx) = core.index_of(self.id) else {
            return;
        };
        if let WidgetKind::Counter { subcounts, .. } = &mut core.widgets[idx].kind {
            if subcounts.iter().any(|s| s.name == name) {
                tracing::warn!(name, "duplicate subcount ignored");
                return;
            }
            subcounts.push(SubCount {
                name: name.to_owned(),
                count: 0.0,
                style,
            });
        }
    }

    /// Atomically move `amount` between subcounts, or between a subcount
    /// and the parent's uncovered remainder (`None`).
    ///
    /// # Errors
    ///
    /// [`TransferError`] when the source cannot cover the amount or a
    /// name is unknown; all counts are unchanged on error.
    pub fn transfer(&self, from: Option<&str>, to: Option<&str>, amount: f64) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.transfer(self.id, from, to, amount)
    }

    /// Redraw now.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] or [`Error::Io`].
    pub fn refresh(&self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.refresh_widget(self.id, true)
    }

    /// Clear this widget's row.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the flush fails.
    pub fn clear(&self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.clear_widget(self.id, true)
    }

    /// Final draw (or clear, when `leave` is off) and removal from the
    /// manager. Closing twice warns and does nothing further.
    pub fn close(&self) {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.close_widget(self.id);
    }

    #[must_use]
    pub fn count(&self) -> f64 {
        let core = self.core.borrow();
        match core.index_of(self.id).map(|idx| &core.widgets[idx].kind) {
            Some(WidgetKind::Counter { count, .. }) => *count,
            _ => 0.0,
        }
    }

    /// Named subcount's current count, if registered.
    #[must_use]
    pub fn subcount(&self, name: &str) -> Option<f64> {
        let core = self.core.borrow();
        let idx = core.index_of(self.id)?;
        match &core.widgets[idx].kind {
            WidgetKind::Counter { subcounts, .. } => {
                subcounts.iter().find(|s| s.name == name).map(|s| s.count)
            }
            WidgetKind::Status { .. } => None,
        }
    }

    pub fn set_total(&self, total: Option<f64>) {
        let mut core = self.core.borrow_mut();
        let Some(idx) = core.index_of(self.id) else {
            return;
        };
        if let WidgetKind::Counter { total: slot, .. } = &mut core.widgets[idx].kind {
            *slot = total;
        }
    }

    pub fn set_desc(&self, desc: &str) {
        let mut core = self.core.borrow_mut();
        let Some(idx) = core.index_of(self.id) else {
            return;
        };
        if let WidgetKind::Counter { desc: slot, .. } = &mut core.widgets[idx].kind {
            *slot = desc.to_owned();
        }
    }

    pub fn set_unit(&self, unit: &str) {
        let mut core = self.core.borrow_mut();
        let Some(idx) = core.index_of(self.id) else {
            return;
        };
        if let WidgetKind::Counter { unit: slot, .. } = &mut core.widgets[idx].kind {
            *slot = unit.to_owned();
        }
    }

    /// Set or replace a user-defined format field.
    pub fn set_field(&self, name: &str, value: &str) {
        let mut core = self.core.borrow_mut();
        let Some(idx) = core.index_of(self.id) else {
            return;
        };
        core.widgets[idx].fields.set(name, value);
    }

    /// Current row offset from the bottom, or `None` once removed.
    #[must_use]
    pub fn offset(&self) -> Option<u16> {
        let core = self.core.borrow();
        core.index_of(self.id).map(|idx| core.widgets[idx].offset)
    }
}

/// Status line handle.
pub struct StatusBar {
    core: Rc<RefCell<Core>>,
    id: u64,
}

impl StatusBar {
    /// Set direct content and redraw if past the minimum refresh interval.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] or [`Error::Io`] from the redraw.
    pub fn update(&self, message: &str) -> Result<()> {
        self.set_message(Some(message.to_owned()), false)
    }

    /// [`update`](Self::update) bypassing the refresh interval.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub fn update_force(&self, message: &str) -> Result<()> {
        self.set_message(Some(message.to_owned()), true)
    }

    /// Drop direct content so `status_format` takes effect again.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] or [`Error::Io`] from the redraw.
    pub fn clear_message(&self) -> Result<()> {
        self.set_message(None, true)
    }

    fn set_message(&self, message: Option<String>, force: bool) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        let Some(idx) = core.index_of(self.id) else {
            tracing::warn!(id = self.id, "update on unmanaged status bar ignored");
            return Ok(());
        };
        if let WidgetKind::Status { message: slot, .. } = &mut core.widgets[idx].kind {
            *slot = message;
        }
        let now = Instant::now();
        let due = now.saturating_duration_since(core.widgets[idx].last_update)
            >= core.widgets[idx].min_refresh;
        if core.enabled && core.widgets[idx].enabled && (force || due) {
            core.refresh_widget(self.id, true)?;
        }
        Ok(())
    }

    /// Set or replace a user-defined format field.
    pub fn set_field(&self, name: &str, value: &str) {
        let mut core = self.core.borrow_mut();
        let Some(idx) = core.index_of(self.id) else {
            return;
        };
        core.widgets[idx].fields.set(name, value);
    }

    /// Redraw now.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] or [`Error::Io`].
    pub fn refresh(&self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.refresh_widget(self.id, true)
    }

    /// Clear this widget's row.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the flush fails.
    pub fn clear(&self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.clear_widget(self.id, true)
    }

    /// Final draw (or clear, when `leave` is off) and removal from the
    /// manager. Closing twice warns and does nothing further.
    pub fn close(&self) {
        let mut core = self.core.borrow_mut();
        core.poll_resize(false);
        core.close_widget(self.id);
    }

    /// Current row offset from the bottom, or `None` once removed.
    #[must_use]
    pub fn offset(&self) -> Option<u16> {
        let core = self.core.borrow();
        core.index_of(self.id).map(|idx| core.widgets[idx].offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedSink {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }

        fn len(&self) -> usize {
            self.0.borrow().len()
        }
    }

    fn manager_over(sink: &SharedSink) -> Manager {
        Manager::builder()
            .stream(StreamTarget::Custom(Box::new(sink.clone())))
            .geometry(Geometry {
                width: 80,
                height: 25,
            })
            .enabled(true)
            .no_resize(true)
            .min_refresh(Duration::ZERO)
            .build()
    }

    #[test]
    fn disabled_manager_accepts_operations_silently() {
        let sink = SharedSink::default();
        let manager = Manager::builder()
            .stream(StreamTarget::Custom(Box::new(sink.clone())))
            .geometry(Geometry {
                width: 80,
                height: 25,
            })
            .enabled(false)
            .build();

        let counter = manager.counter(CounterOptions::new().total(10.0)).unwrap();
        counter.update(5.0).unwrap();
        counter.refresh().unwrap();
        counter.close();
        manager.stop();

        assert_eq!(sink.len(), 0);
        assert!(!manager.is_enabled());
    }

    #[test]
    fn three_auto_widgets_stack_newest_at_bottom() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);

        let first = manager.counter(CounterOptions::new()).unwrap();
        let second = manager.counter(CounterOptions::new()).unwrap();
        let third = manager.counter(CounterOptions::new()).unwrap();

        assert_eq!(first.offset(), Some(3));
        assert_eq!(second.offset(), Some(2));
        assert_eq!(third.offset(), Some(1));
        assert_eq!(manager.scroll_offset(), 4);
    }

    #[test]
    fn auto_widgets_never_touch_a_pin() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);

        let pinned = manager.counter(CounterOptions::new().position(5)).unwrap();
        let auto_a = manager.counter(CounterOptions::new()).unwrap();
        let auto_b = manager.counter(CounterOptions::new()).unwrap();

        assert_eq!(pinned.offset(), Some(5));
        assert_eq!(auto_a.offset(), Some(2));
        assert_eq!(auto_b.offset(), Some(1));
        assert_eq!(manager.scroll_offset(), 6);
    }

    #[test]
    fn out_of_range_pin_leaves_table_unchanged() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let existing = manager.counter(CounterOptions::new()).unwrap();

        let err = manager
            .counter(CounterOptions::new().position(30))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Layout(LayoutError::PinOutOfRange {
                offset: 30,
                height: 25,
            })
        ));
        assert_eq!(existing.offset(), Some(1));
        assert_eq!(manager.scroll_offset(), 2);
    }

    #[test]
    fn colliding_pin_is_rejected() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let _pinned = manager.counter(CounterOptions::new().position(3)).unwrap();

        let err = manager
            .counter(CounterOptions::new().position(3))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Layout(LayoutError::PinOccupied { offset: 3 })
        ));
    }

    #[test]
    fn status_bar_draws_on_creation_with_scroll_setup() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let _bar = manager
            .status_bar(StatusOptions::new().message("working"))
            .unwrap();

        let contents = sink.contents();
        assert!(contents.contains("\x1b[1;24r"), "scroll region: {contents:?}");
        assert!(contents.contains("\x1b[25;1H"), "bottom row: {contents:?}");
        assert!(contents.contains("working"));
    }

    #[test]
    fn counter_is_not_drawn_on_creation() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let _counter = manager
            .counter(CounterOptions::new().desc("quiet").total(10.0))
            .unwrap();

        assert!(!sink.contents().contains("quiet"));
    }

    #[test]
    fn bumped_widget_is_cleared_at_old_row_and_redrawn() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let bar = manager
            .status_bar(StatusOptions::new().message("first"))
            .unwrap();
        assert_eq!(bar.offset(), Some(1));

        let newer = manager
            .status_bar(StatusOptions::new().message("second"))
            .unwrap();
        assert_eq!(bar.offset(), Some(2));
        assert_eq!(newer.offset(), Some(1));

        let contents = sink.contents();
        // The bumped widget is redrawn at its new row and the newcomer at
        // the bottom row.
        assert!(contents.contains("\x1b[24;1H\r\x1b[0Kfirst"), "{contents:?}");
        assert!(contents.contains("\x1b[25;1H\r\x1b[0Ksecond"), "{contents:?}");
    }

    #[test]
    fn close_without_leave_clears_and_removes() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let bar = manager
            .status_bar(StatusOptions::new().message("gone").leave(false))
            .unwrap();

        bar.close();
        assert_eq!(bar.offset(), None);

        let contents = sink.contents();
        let last_draw = contents.rfind("gone").unwrap();
        let clear = contents.rfind("\x1b[25;1H\r\x1b[0K").unwrap();
        assert!(clear > last_draw, "row cleared after final draw");
    }

    #[test]
    fn close_with_leave_keeps_the_row() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let bar = manager
            .status_bar(StatusOptions::new().message("kept").leave(true))
            .unwrap();

        bar.close();
        assert_eq!(bar.offset(), Some(1));
        assert_eq!(manager.scroll_offset(), 2);
    }

    #[test]
    fn replace_keeps_offset_and_pin() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let old = manager
            .counter(CounterOptions::new().position(4).total(10.0))
            .unwrap();

        let new = manager
            .replace(&old, CounterOptions::new().total(20.0))
            .unwrap();
        assert_eq!(new.offset(), Some(4));
        assert_eq!(old.offset(), None);

        // The inherited slot still counts as pinned.
        let err = manager
            .counter(CounterOptions::new().position(4))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Layout(LayoutError::PinOccupied { offset: 4 })
        ));
    }

    #[test]
    fn replace_unmanaged_widget_errors() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let counter = manager
            .counter(CounterOptions::new().leave(false))
            .unwrap();
        counter.close();

        let err = manager.replace(&counter, CounterOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Layout(LayoutError::NotManaged)));
    }

    #[test]
    fn update_to_total_redraws_immediately() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let counter = manager
            .counter(CounterOptions::new().desc("done").total(10.0))
            .unwrap();

        counter.update(10.0).unwrap();
        assert!(sink.contents().contains("done"));
        assert!(sink.contents().contains("100%"));
    }

    #[test]
    fn subcount_transfer_is_atomic() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let counter = manager.counter(CounterOptions::new().total(10.0)).unwrap();
        counter.add_subcounter("failed", Style::new());
        counter.add_subcounter("passed", Style::new());

        counter.update_subcount("passed", 4.0).unwrap();
        counter.update(2.0).unwrap();

        // Remainder is 2; moving 3 from it must fail without mutation.
        let err = counter
            .transfer(None, Some("failed"), 3.0)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer(TransferError::Underflow { .. })
        ));
        assert_eq!(counter.subcount("passed"), Some(4.0));
        assert_eq!(counter.subcount("failed"), Some(0.0));
        assert_eq!(counter.count(), 6.0);

        counter.transfer(Some("passed"), Some("failed"), 1.0).unwrap();
        assert_eq!(counter.subcount("passed"), Some(3.0));
        assert_eq!(counter.subcount("failed"), Some(1.0));
        assert_eq!(counter.count(), 6.0);
    }

    #[test]
    fn transfer_unknown_subcount_errors() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let counter = manager.counter(CounterOptions::new().total(10.0)).unwrap();

        let err = counter.transfer(Some("nope"), None, 1.0).unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer(TransferError::UnknownSubcount(_))
        ));
    }

    #[test]
    fn autorefresh_cascade_redraws_due_sibling_once() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let _sibling = manager
            .counter(CounterOptions::new().desc("sibling").autorefresh(true))
            .unwrap();
        let bar = manager
            .status_bar(StatusOptions::new().message("ping"))
            .unwrap();
        sink.0.borrow_mut().clear();

        bar.update("ping").unwrap();
        let contents = sink.contents();
        // The triggering widget draws once; the due autorefresh sibling is
        // pulled into the same frame exactly once, and the nested write
        // does not restart the cascade.
        assert_eq!(contents.matches("ping").count(), 1, "{contents:?}");
        assert_eq!(contents.matches("sibling").count(), 1, "{contents:?}");
    }

    #[test]
    fn autorefresh_skips_widgets_not_opted_in() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let _quiet = manager
            .counter(CounterOptions::new().desc("quiet"))
            .unwrap();
        let bar = manager
            .status_bar(StatusOptions::new().message("ping"))
            .unwrap();
        sink.0.borrow_mut().clear();

        bar.update("ping").unwrap();
        assert!(!sink.contents().contains("quiet"));
    }

    #[test]
    fn stop_restores_terminal_once() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let _bar = manager
            .status_bar(StatusOptions::new().message("x"))
            .unwrap();

        manager.stop();
        let contents = sink.contents();
        assert_eq!(contents.matches("\x1b[r").count(), 1);
        assert_eq!(contents.matches("\x1b[?25h").count(), 1);
        // Offset 1 occupied, so exactly one terminating feed.
        assert!(contents.ends_with('\n'));

        let len = sink.len();
        manager.stop();
        assert_eq!(sink.len(), len, "second stop writes nothing");
    }

    #[test]
    fn stopped_manager_ignores_widget_operations() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let counter = manager.counter(CounterOptions::new()).unwrap();
        manager.stop();

        let len = sink.len();
        counter.update(1.0).unwrap();
        counter.refresh().unwrap();
        assert_eq!(sink.len(), len);
    }

    #[test]
    fn write_at_positions_and_parks_cursor() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let _bar = manager
            .status_bar(StatusOptions::new().message("x"))
            .unwrap();
        sink.0.borrow_mut().clear();

        manager.write_at(1, Content::Text("hello".to_owned())).unwrap();
        let contents = sink.contents();
        assert!(contents.contains("\x1b[25;1H\r\x1b[0Khello"));
        // Cursor parked back at the scroll line.
        assert!(contents.ends_with("\x1b[24;1H"));
    }

    #[test]
    fn deferred_content_skipped_when_disabled() {
        let sink = SharedSink::default();
        let manager = Manager::builder()
            .stream(StreamTarget::Custom(Box::new(sink.clone())))
            .geometry(Geometry {
                width: 80,
                height: 25,
            })
            .enabled(false)
            .build();

        manager
            .write_at(
                0,
                Content::Deferred(Box::new(|| panic!("rendered while disabled"))),
            )
            .unwrap();
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn deferred_resize_coalesces_into_one_pass() {
        let sink = SharedSink::default();
        let manager = Manager::builder()
            .stream(StreamTarget::Custom(Box::new(sink.clone())))
            .geometry(Geometry {
                width: 80,
                height: 25,
            })
            .enabled(true)
            .no_resize(true)
            .resize_mode(ResizeMode::Deferred)
            .min_refresh(Duration::ZERO)
            .build();
        let _bar = manager
            .status_bar(StatusOptions::new().message("x"))
            .unwrap();
        let regions_before = sink.contents().matches("\x1b[1;24r").count();

        manager.notify_resize();
        manager.notify_resize();
        manager.notify_resize();
        assert_eq!(
            sink.contents().matches("\x1b[1;24r").count(),
            regions_before,
            "deferred resize waits for a write"
        );

        manager.write_at(0, Content::Text(String::new())).unwrap();
        assert_eq!(
            sink.contents().matches("\x1b[1;24r").count(),
            regions_before + 1,
            "three latched resizes produce one forced relayout"
        );
    }

    #[test]
    fn shrinking_terminal_relayouts_on_screen() {
        let sink = SharedSink::default();
        let manager = manager_over(&sink);
        let widgets: Vec<_> = (0..3)
            .map(|i| {
                manager
                    .status_bar(StatusOptions::new().message(format!("bar{i}")))
                    .unwrap()
            })
            .collect();
        assert_eq!(manager.scroll_offset(), 4);

        manager.core.borrow_mut().surface.set_geometry(Geometry {
            width: 80,
            height: 20,
        });
        manager.notify_resize();
        widgets[0].refresh().unwrap();

        let contents = sink.contents();
        // New scroll region bottom: 20 - 4 + 1 = 17.
        assert!(contents.contains("\x1b[1;17r"));
        // Widgets redraw at rows 20, 19, 18.
        assert!(contents.contains("\x1b[20;1H"));
        assert!(contents.contains("\x1b[19;1H"));
        assert!(contents.contains("\x1b[18;1H"));
    }
}

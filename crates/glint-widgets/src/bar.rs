#![forbid(unsafe_code)]

//! Progress bar and counter rendering.
//!
//! A widget renders in one of two modes. Bar mode applies when a total is
//! known and the count has not passed it; the `{bar}` placeholder expands to
//! whatever width the rest of the template leaves over. Counter mode is the
//! open-ended fallback, used when there is no total or the count overshot
//! it, with `{fill}` padding the line to full width.
//!
//! Numeric fields are preformatted to strings before template substitution:
//! counts print as integers while they have no fractional part, rates with
//! two decimals, the percentage right-aligned to three columns.

use glint_term::{ColorProfile, Style, printable_width};

use crate::fields::{
    FILL_PLACEHOLDER, Fields, FormatError, FormatKind, expand_fill, render_template,
};
use crate::time::format_duration;

/// Default bar series. First char is the fill, last is the full block,
/// the middle chars are fractional eighths.
pub const SERIES_STD: &str = " ▏▎▍▌▋▊▉█";

/// Default format for bar mode.
pub const BAR_FORMAT: &str =
    "{desc}{desc_pad}{percentage}%|{bar}| {count}/{total} [{elapsed}<{eta}, {rate}{unit_pad}{unit}/s]";

/// Default format for counter mode.
pub const COUNTER_FORMAT: &str =
    "{desc}{desc_pad}{count} {unit}{unit_pad}[{elapsed}, {rate}{unit_pad}{unit}/s]{fill}";

/// One named portion of a parent count, drawn as a colored bar segment.
#[derive(Debug, Clone)]
pub struct SegmentSnapshot {
    pub count: f64,
    pub style: Style,
}

/// Point-in-time widget state handed to the renderer.
///
/// `elapsed` is supplied by the caller so the clock can be frozen at
/// completion; the renderer itself never reads wall time.
#[derive(Debug, Clone)]
pub struct BarSnapshot {
    pub count: f64,
    pub start_count: f64,
    pub total: Option<f64>,
    pub desc: String,
    pub unit: String,
    pub elapsed: f64,
    /// Subcount segments in insertion order.
    pub subcounts: Vec<SegmentSnapshot>,
}

impl Default for BarSnapshot {
    fn default() -> Self {
        Self {
            count: 0.0,
            start_count: 0.0,
            total: None,
            desc: String::new(),
            unit: String::new(),
            elapsed: 0.0,
            subcounts: Vec::new(),
        }
    }
}

/// Stateless renderer for bars and counters.
#[derive(Debug, Clone)]
pub struct BarRenderer {
    pub bar_format: String,
    pub counter_format: String,
    pub series: Vec<char>,
    pub fill: String,
    /// Style for the parent's own bar portion, and for the whole line in
    /// counter mode.
    pub style: Option<Style>,
    pub profile: ColorProfile,
}

impl BarRenderer {
    #[must_use]
    pub fn new(profile: ColorProfile) -> Self {
        Self {
            bar_format: BAR_FORMAT.to_owned(),
            counter_format: COUNTER_FORMAT.to_owned(),
            series: SERIES_STD.chars().collect(),
            fill: " ".to_owned(),
            style: None,
            profile,
        }
    }

    /// Render `snapshot` to exactly `width` printable columns.
    ///
    /// # Errors
    ///
    /// [`FormatError::MissingField`] when the active format references a
    /// field neither computed nor present in `fields`.
    pub fn render(
        &self,
        snapshot: &BarSnapshot,
        fields: &Fields,
        width: usize,
    ) -> Result<String, FormatError> {
        let iterations = (snapshot.count - snapshot.start_count).abs();
        let rate = if snapshot.elapsed > 0.0 {
            iterations / snapshot.elapsed
        } else {
            0.0
        };

        let desc = snapshot.desc.as_str();
        let unit = snapshot.unit.as_str();
        let elapsed = format_duration(snapshot.elapsed);
        let rate_str = format!("{rate:.2}");

        let bar_mode = snapshot
            .total
            .is_some_and(|total| snapshot.count <= total);

        if bar_mode {
            let total = snapshot.total.unwrap_or(0.0);
            let total_str = fmt_count(total);
            let len_total = total_str.len();

            let (percentage, eta) = if total == 0.0 {
                (100.0, "00:00".to_owned())
            } else {
                let pct = snapshot.count / total * 100.0;
                let eta = if rate > 0.0 {
                    format_duration((total - iterations) / rate)
                } else {
                    "?".to_owned()
                };
                (pct, eta)
            };

            let resolve = |name: &str| -> Option<String> {
                match name {
                    "bar" => Some(FILL_PLACEHOLDER.to_string()),
                    "count" => Some(format!("{:>len_total$}", fmt_count(snapshot.count))),
                    "total" => Some(total_str.clone()),
                    "desc" => Some(desc.to_owned()),
                    "unit" => Some(unit.to_owned()),
                    "desc_pad" => Some(pad_for(desc)),
                    "unit_pad" => Some(pad_for(unit)),
                    "elapsed" => Some(elapsed.clone()),
                    "eta" => Some(eta.clone()),
                    "rate" => Some(rate_str.clone()),
                    "percentage" => Some(format!("{percentage:3.0}")),
                    "len_total" => Some(len_total.to_string()),
                    _ => fields.get(name).map(str::to_owned),
                }
            };

            let partial = render_template(&self.bar_format, FormatKind::Bar, resolve)?;
            let bar_width = width.saturating_sub(printable_width(&partial));
            let bar = self.render_bar(snapshot, total, bar_width);
            Ok(partial.replace(FILL_PLACEHOLDER, &bar))
        } else {
            let resolve = |name: &str| -> Option<String> {
                match name {
                    "fill" => Some(FILL_PLACEHOLDER.to_string()),
                    "count" => Some(fmt_count(snapshot.count)),
                    "desc" => Some(desc.to_owned()),
                    "unit" => Some(unit.to_owned()),
                    "desc_pad" => Some(pad_for(desc)),
                    "unit_pad" => Some(pad_for(unit)),
                    "elapsed" => Some(elapsed.clone()),
                    "rate" => Some(rate_str.clone()),
                    _ => fields.get(name).map(str::to_owned),
                }
            };

            let rendered = render_template(&self.counter_format, FormatKind::Counter, resolve)?;
            let filled = expand_fill(&rendered, width, &self.fill);
            Ok(match self.style {
                Some(style) => style.apply(&filled, self.profile),
                None => filled,
            })
        }
    }

    /// Draw the bar itself across `bar_width` columns.
    ///
    /// Subcount segments come first in insertion order, then the parent's
    /// uncovered remainder in the parent style, then fill characters. Each
    /// segment boundary is placed by cumulative ratio so segments stay
    /// contiguous; a fractional boundary cell uses the series eighths.
    fn render_bar(&self, snapshot: &BarSnapshot, total: f64, bar_width: usize) -> String {
        let full = *self.series.last().unwrap_or(&'█');
        let fill = *self.series.first().unwrap_or(&' ');
        let parent_style = self.style.unwrap_or_default();

        if total == 0.0 {
            let text: String = std::iter::repeat_n(full, bar_width).collect();
            return parent_style.apply(&text, self.profile);
        }

        let covered: f64 = snapshot.subcounts.iter().map(|s| s.count).sum();
        let mut segments: Vec<(f64, &Style)> = snapshot
            .subcounts
            .iter()
            .map(|s| (s.count, &s.style))
            .collect();
        segments.push((snapshot.count - covered, &parent_style));

        let mut out = String::new();
        let mut drawn = 0usize;
        let mut cumulative = 0.0_f64;

        for (count, style) in segments {
            cumulative += count;
            let ratio = (cumulative / total).clamp(0.0, 1.0);
            let complete = bar_width as f64 * ratio;
            let cells = complete.floor() as usize;
            let fraction = complete - cells as f64;

            let mut boundary: Vec<char> = std::iter::repeat_n(full, cells).collect();
            if cells < bar_width && fraction > 0.0 {
                let idx = (fraction * (self.series.len() - 1) as f64).round() as usize;
                if idx > 0 {
                    boundary.push(self.series[idx]);
                }
            }

            if boundary.len() > drawn {
                let text: String = boundary[drawn..].iter().collect();
                drawn = boundary.len();
                out.push_str(&style.apply(&text, self.profile));
            }
        }

        for _ in drawn..bar_width {
            out.push(fill);
        }
        out
    }
}

fn pad_for(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        " ".to_owned()
    }
}

fn fmt_count(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}

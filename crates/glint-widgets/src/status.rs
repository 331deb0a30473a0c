#![forbid(unsafe_code)]

//! Status bar rendering.
//!
//! A status bar is populated one of two ways. Direct content is a
//! pre-joined message set by the caller and takes precedence. Formatted
//! content renders `status_format` against the reserved `elapsed` and
//! `fill` fields plus any user fields. Either way the result is justified
//! to the full width with the fill character and colorized as a whole.

use glint_term::{ColorProfile, Style};

use crate::fields::{
    FILL_PLACEHOLDER, Fields, FormatError, FormatKind, Justify, expand_fill, render_template,
};
use crate::time::format_duration;

/// Point-in-time status bar state.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    /// Direct content; overrides the format when present.
    pub message: Option<String>,
    pub elapsed: f64,
}

/// Stateless renderer for status lines.
#[derive(Debug, Clone)]
pub struct StatusRenderer {
    pub status_format: Option<String>,
    pub justify: Justify,
    pub fill: String,
    pub style: Option<Style>,
    pub profile: ColorProfile,
}

impl StatusRenderer {
    #[must_use]
    pub fn new(profile: ColorProfile) -> Self {
        Self {
            status_format: None,
            justify: Justify::Left,
            fill: " ".to_owned(),
            style: None,
            profile,
        }
    }

    /// Render `snapshot` to exactly `width` printable columns.
    ///
    /// # Errors
    ///
    /// [`FormatError::MissingField`] when `status_format` references a
    /// field that is neither reserved nor present in `fields`.
    pub fn render(
        &self,
        snapshot: &StatusSnapshot,
        fields: &Fields,
        width: usize,
    ) -> Result<String, FormatError> {
        let content = if let Some(message) = &snapshot.message {
            message.clone()
        } else if let Some(format) = &self.status_format {
            let elapsed = format_duration(snapshot.elapsed);
            let resolve = |name: &str| -> Option<String> {
                match name {
                    "elapsed" => Some(elapsed.clone()),
                    "fill" => Some(FILL_PLACEHOLDER.to_string()),
                    _ => fields.get(name).map(str::to_owned),
                }
            };
            render_template(format, FormatKind::Status, resolve)?
        } else {
            String::new()
        };

        let filled = expand_fill(&content, width, &self.fill);
        let justified = self.justify.apply(&filled, width, &self.fill);
        Ok(match self.style {
            Some(style) => style.apply(&justified, self.profile),
            None => justified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_term::{Ansi16, Color, printable_width};

    fn renderer() -> StatusRenderer {
        StatusRenderer::new(ColorProfile::Ansi16)
    }

    #[test]
    fn direct_content_wins_over_format() {
        let mut renderer = renderer();
        renderer.status_format = Some("stage {stage}".to_owned());
        let snapshot = StatusSnapshot {
            message: Some("Hello World!".to_owned()),
            elapsed: 0.0,
        };
        let out = renderer.render(&snapshot, &Fields::new(), 20).unwrap();
        assert_eq!(out, "Hello World!        ");
    }

    #[test]
    fn empty_without_format_or_message() {
        let out = renderer()
            .render(&StatusSnapshot::default(), &Fields::new(), 10)
            .unwrap();
        assert_eq!(out, " ".repeat(10));
    }

    #[test]
    fn formatted_content_uses_fields() {
        let mut renderer = renderer();
        renderer.status_format = Some("Stage: {stage} [{elapsed}]".to_owned());
        let fields: Fields = [("stage", "Testing")].into_iter().collect();
        let snapshot = StatusSnapshot {
            message: None,
            elapsed: 65.0,
        };
        let out = renderer.render(&snapshot, &fields, 30).unwrap();
        assert!(out.starts_with("Stage: Testing [01:05]"));
        assert_eq!(printable_width(&out), 30);
    }

    #[test]
    fn fill_distributes_between_occurrences() {
        let mut renderer = renderer();
        renderer.status_format = Some("L{fill}C{fill}R".to_owned());
        let out = renderer
            .render(&StatusSnapshot::default(), &Fields::new(), 11)
            .unwrap();
        assert_eq!(out, "L    C    R");
    }

    #[test]
    fn missing_field_reports_status_kind() {
        let mut renderer = renderer();
        renderer.status_format = Some("{stage}".to_owned());
        let err = renderer
            .render(&StatusSnapshot::default(), &Fields::new(), 10)
            .unwrap_err();
        assert_eq!(
            err,
            FormatError::MissingField {
                field: "stage".to_owned(),
                kind: FormatKind::Status,
            }
        );
    }

    #[test]
    fn center_justify_with_custom_fill() {
        let mut renderer = renderer();
        renderer.justify = Justify::Center;
        renderer.fill = "-".to_owned();
        let snapshot = StatusSnapshot {
            message: Some("hi".to_owned()),
            elapsed: 0.0,
        };
        let out = renderer.render(&snapshot, &Fields::new(), 8).unwrap();
        assert_eq!(out, "---hi---");
    }

    #[test]
    fn style_wraps_whole_line() {
        let mut renderer = renderer();
        renderer.style = Some(Style::new().fg(Color::Named(Ansi16::Red)).reverse());
        let snapshot = StatusSnapshot {
            message: Some("x".to_owned()),
            elapsed: 0.0,
        };
        let out = renderer.render(&snapshot, &Fields::new(), 3).unwrap();
        assert!(out.starts_with("\x1b["));
        assert!(out.ends_with("\x1b[0m"));
        assert_eq!(printable_width(&out), 3);
    }
}

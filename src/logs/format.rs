use super::{LineKind, LogLine, ParsedLogs};
use chrono::DateTime;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

const GROUP_MARKER: &str = "▶ ";

impl ParsedLogs {
    /// Styled lines for one step, or every line (prefix included) for `None`.
    ///
    /// Group end markers are dropped. Out-of-range indices clamp to the last
    /// step; with no steps the aggregate is returned. An empty result means
    /// there is nothing to show and the caller substitutes a placeholder.
    pub fn format_step_logs(&self, index: Option<usize>) -> Vec<Line<'static>> {
        let lines = match self.resolve_step(index) {
            Some(i) => self.step_lines(i),
            None => &self.lines[..],
        };
        lines.iter().filter_map(format_line).collect()
    }
}

fn format_line(line: &LogLine) -> Option<Line<'static>> {
    if line.kind == LineKind::GroupEnd {
        return None;
    }
    let mut spans = Vec::with_capacity(2);
    if let Some(ts) = line.timestamp.as_deref() {
        spans.push(Span::styled(
            format!("{} ", short_time(ts)),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let body = match line.kind {
        LineKind::GroupStart => format!("{GROUP_MARKER}{}", line.text),
        _ => line.text.clone(),
    };
    spans.push(Span::styled(body, body_style(line)));
    Some(Line::from(spans))
}

fn short_time(ts: &str) -> String {
    DateTime::parse_from_rfc3339(ts)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| ts.to_string())
}

fn body_style(line: &LogLine) -> Style {
    let style = Style::default();
    match (line.kind, line.marker) {
        (LineKind::GroupStart, _) => style.fg(Color::Green).add_modifier(Modifier::BOLD),
        (LineKind::Error, true) => style.fg(Color::Red).add_modifier(Modifier::BOLD),
        (LineKind::Error, false) => style.fg(Color::LightRed),
        (LineKind::Warning, true) => style.fg(Color::Yellow),
        (LineKind::Warning, false) => style.fg(Color::LightYellow),
        (LineKind::Notice, _) => style.fg(Color::Cyan),
        (LineKind::Plain | LineKind::GroupEnd, _) => style,
    }
}

/// Drops styling, one text line per rendered line.
pub fn to_plain_text(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|s| s.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

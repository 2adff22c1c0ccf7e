//! Step-structured view over raw CI job logs.
//!
//! [`parse_logs`] splits a flat timestamped log stream into the `##[group]`
//! sections the runner writes per step. [`ParsedLogs::format_step_logs`] renders
//! one step (or all of them) as styled ratatui lines.

mod format;
mod parser;

use std::ops::Range;

pub use format::to_plain_text;
pub use parser::parse_logs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Plain,
    GroupStart,
    GroupEnd,
    Error,
    Warning,
    Notice,
}

impl LineKind {
    pub fn is_severity(self) -> bool {
        matches!(self, LineKind::Error | LineKind::Warning | LineKind::Notice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Raw RFC 3339 token the runner prefixed the line with.
    pub timestamp: Option<String>,
    /// Line body with the timestamp, ANSI escapes and any marker removed.
    /// For a group start this is the step name.
    pub text: String,
    pub kind: LineKind,
    /// `kind` came from an explicit `##[...]` or `::...::` marker rather than
    /// a keyword found in the text.
    pub marker: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStep {
    pub name: String,
    /// Half-open range into [`ParsedLogs::lines`].
    pub range: Range<usize>,
    /// An explicit group end was seen. False when the step was closed by the
    /// next group start or by the end of input.
    pub terminated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLogs {
    pub lines: Vec<LogLine>,
    pub steps: Vec<LogStep>,
    /// Lines before the first group start. Shown only in the aggregate view.
    pub prefix_len: usize,
}

impl ParsedLogs {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn step_lines(&self, index: usize) -> &[LogLine] {
        self.steps
            .get(index)
            .and_then(|s| self.lines.get(s.range.clone()))
            .unwrap_or(&[])
    }

    /// Maps a requested step to the one actually rendered: `None` stays the
    /// aggregate, an index past the end clamps to the last step, and with no
    /// steps at all every request falls back to the aggregate.
    pub fn resolve_step(&self, index: Option<usize>) -> Option<usize> {
        let last = self.steps.len().checked_sub(1)?;
        index.map(|i| i.min(last))
    }

    pub fn error_count(&self, index: usize) -> usize {
        self.count_kind(index, LineKind::Error)
    }

    pub fn warning_count(&self, index: usize) -> usize {
        self.count_kind(index, LineKind::Warning)
    }

    fn count_kind(&self, index: usize, kind: LineKind) -> usize {
        self.step_lines(index)
            .iter()
            .filter(|l| l.kind == kind)
            .count()
    }
}

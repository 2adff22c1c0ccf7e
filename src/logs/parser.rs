use super::{LineKind, LogLine, LogStep, ParsedLogs};
use chrono::DateTime;

const BOM: char = '\u{feff}';

/// Builds the step view of a raw job log.
///
/// A group start opens a step that runs until the next group start or the end
/// of input. The group end line and whatever follows it stay in that step,
/// since the runner prints a step's command output after closing the header
/// group. Only lines before the first group start are left ungrouped.
pub fn parse_logs(raw: &str) -> ParsedLogs {
    let raw = raw.strip_prefix(BOM).unwrap_or(raw);
    let mut lines: Vec<LogLine> = Vec::new();
    let mut steps: Vec<LogStep> = Vec::new();
    let mut in_group = false;

    for raw_line in raw.lines() {
        let line = parse_line(raw_line);
        let idx = lines.len();
        match line.kind {
            LineKind::GroupStart => {
                // Nested groups are not modelled: a start inside an open group
                // closes it here. Not verified against real nested runner output.
                steps.push(LogStep {
                    name: line.text.clone(),
                    range: idx..idx + 1,
                    terminated: false,
                });
                in_group = true;
            }
            LineKind::GroupEnd => {
                if let Some(step) = steps.last_mut() {
                    step.range.end = idx + 1;
                    if in_group {
                        step.terminated = true;
                    }
                }
                in_group = false;
            }
            _ => {
                if let Some(step) = steps.last_mut() {
                    step.range.end = idx + 1;
                }
            }
        }
        lines.push(line);
    }

    let prefix_len = steps.first().map_or(lines.len(), |s| s.range.start);
    ParsedLogs {
        lines,
        steps,
        prefix_len,
    }
}

fn parse_line(raw: &str) -> LogLine {
    let (timestamp, rest) = split_timestamp(raw);
    let clean = strip_ansi(rest);
    let (kind, text, marker) = match classify_marker(&clean) {
        Some((kind, body)) => (kind, body.to_string(), true),
        None => (classify_keyword(&clean), clean.clone(), false),
    };
    LogLine {
        timestamp: timestamp.map(str::to_string),
        text,
        kind,
        marker,
    }
}

fn split_timestamp(line: &str) -> (Option<&str>, &str) {
    let (token, rest) = line.split_once(' ').unwrap_or((line, ""));
    if DateTime::parse_from_rfc3339(token).is_ok() {
        (Some(token), rest)
    } else {
        (None, line)
    }
}

/// Removes CSI sequences (`ESC [ params final`). A lone ESC is dropped.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if ('\x40'..='\x7e').contains(&c) {
                    break;
                }
            }
        }
    }
    out
}

/// Explicit runner markers, in both the `##[cmd]` log spelling and the
/// `::cmd::` workflow-command spelling. Returns the kind and the text after
/// the marker.
fn classify_marker(line: &str) -> Option<(LineKind, &str)> {
    if let Some(rest) = line.strip_prefix("##[") {
        let (cmd, body) = rest.split_once(']')?;
        return marker_kind(cmd).map(|k| (k, body));
    }
    if let Some(rest) = line.strip_prefix("::") {
        let (cmd, body) = rest.split_once("::")?;
        // `::error file=a.rs,line=3::msg` carries parameters after the name
        let name = cmd.split_once(' ').map_or(cmd, |(name, _)| name);
        return marker_kind(name).map(|k| (k, body));
    }
    None
}

fn marker_kind(cmd: &str) -> Option<LineKind> {
    match cmd {
        "group" => Some(LineKind::GroupStart),
        "endgroup" => Some(LineKind::GroupEnd),
        "error" => Some(LineKind::Error),
        "warning" => Some(LineKind::Warning),
        "notice" => Some(LineKind::Notice),
        _ => None,
    }
}

fn classify_keyword(text: &str) -> LineKind {
    let mut found = LineKind::Plain;
    for word in text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if word.eq_ignore_ascii_case("error") {
            return LineKind::Error;
        }
        if word.eq_ignore_ascii_case("warning") {
            found = LineKind::Warning;
        } else if word.eq_ignore_ascii_case("notice") && found == LineKind::Plain {
            found = LineKind::Notice;
        }
    }
    found
}

//! Recent log output of one app or of every app on the account.
//!
//! Platform log entries carry a comma separated `key=value` text such as
//! `app=blog,desc=listening on 8080`. The `desc` value is the message; a part
//! that contains `=` itself (`desc=a=b`) is treated as message text as well.
//! Entries without any recognisable message are shown verbatim.

use super::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::model::LogEntry;
use crate::remote::Platform;

pub const DEFAULT_LINES: usize = 10;

/// One printable line of log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: String,
    /// Set when lines of several apps are printed together.
    pub app: Option<String>,
    pub text: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ParsedText {
    app: Option<String>,
    text: Option<String>,
}

fn parse_text(raw: &str) -> ParsedText {
    let mut parsed = ParsedText::default();
    for part in raw.split(',') {
        let groups: Vec<&str> = part.split('=').collect();
        if groups.len() > 2 || groups[0] == "desc" {
            parsed.text = Some(groups[1..].concat());
        } else if groups.len() == 2 && groups[0] == "app" {
            parsed.app = Some(groups[1].to_string());
        }
    }
    parsed
}

/// Expand entries into at most `limit` non-empty lines.
fn render(entries: &[LogEntry], app: Option<&str>, limit: usize) -> Vec<LogLine> {
    let mut lines = Vec::new();
    for entry in entries {
        let parsed = parse_text(&entry.text);
        let text = parsed.text.unwrap_or_else(|| entry.text.clone());
        let shown_app = app.map(|fallback| {
            parsed
                .app
                .clone()
                .unwrap_or_else(|| fallback.to_string())
        });

        for line in text.split('\n').filter(|l| !l.is_empty()) {
            if lines.len() == limit {
                return lines;
            }
            lines.push(LogLine {
                timestamp: entry.timestamp.clone(),
                app: shown_app.clone(),
                text: line.to_string(),
            });
        }
    }
    lines
}

pub fn app<P: Platform>(platform: &P, app: &str, lines: usize) -> Result<CmdResult> {
    let entries = platform.app_logs(app, lines)?;
    let mut result = CmdResult::default();
    if entries.is_empty() {
        result.add_message(CmdMessage::warning(format!(
            "No logs for {} in the requested timespan.",
            app
        )));
        return Ok(result);
    }
    Ok(result.with_log_lines(render(&entries, None, lines)))
}

/// Logs of every app, quietest app first.
pub fn all<P: Platform>(platform: &P, lines: usize) -> Result<CmdResult> {
    let mut apps = platform.user_logs(lines)?;
    let mut result = CmdResult::default();
    if apps.is_empty() {
        result.add_message(CmdMessage::warning("No logs in the requested timespan."));
        return Ok(result);
    }

    apps.sort_by_key(|a| a.entries.len());
    let mut out = Vec::new();
    for logs in &apps {
        if logs.entries.is_empty() {
            result.add_message(CmdMessage::warning(format!(
                "No logs for {} in the requested timespan.",
                logs.app
            )));
            continue;
        }
        out.extend(render(&logs.entries, Some(&logs.app), lines));
    }
    Ok(result.with_log_lines(out))
}

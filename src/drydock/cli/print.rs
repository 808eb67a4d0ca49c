use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use console::Term;
use drydock::commands::deploy::{DeployFailure, DeploymentReport, Step};
use drydock::commands::lifecycle::Transition;
use drydock::commands::logs::LogLine;
use drydock::commands::{CmdMessage, MessageLevel};
use drydock::model::{AppRecord, AppState, Snapshot};
use timeago::Formatter;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const NAME_WIDTH: usize = 24;
const STATE_WIDTH: usize = 10;
const VERSION_WIDTH: usize = 14;
const ACTIVE_MARKER: &str = "●";

pub(super) fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

fn colored_state(state: &AppState) -> ColoredString {
    let s = state.to_string();
    match state {
        AppState::Started => s.green(),
        AppState::Stopped => s.red(),
        AppState::Other(_) => s.yellow(),
    }
}

/// Left-align `s` in `width` terminal columns.
fn pad(s: &str, width: usize) -> String {
    let padding = width.saturating_sub(s.width());
    format!("{}{}", s, " ".repeat(padding))
}

/// Cut `s` to at most `max_width` columns, ending in `…` when cut.
fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut current_width = 0;
    let limit = max_width.saturating_sub(1);

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > limit {
            break;
        }
        result.push(c);
        current_width += char_width;
    }
    result.push('…');
    result
}

/// The newest snapshot id, or `---` when there is none.
fn latest_column(app: &AppRecord) -> &str {
    app.latest_snapshot().map(|s| s.id.as_str()).unwrap_or("---")
}

pub(super) fn print_apps(apps: &[AppRecord]) {
    for app in apps {
        let state = app.state.to_string();
        let padding = STATE_WIDTH.saturating_sub(state.width());
        println!(
            "  {}{}{}{}{}{}",
            pad(&app.name, NAME_WIDTH).bold(),
            colored_state(&app.state),
            " ".repeat(padding),
            pad(app.version.as_deref().unwrap_or("-"), VERSION_WIDTH),
            pad(latest_column(app), VERSION_WIDTH).yellow(),
            app.subdomain.as_deref().unwrap_or("").dimmed()
        );
    }
}

pub(super) fn print_logs(lines: &[LogLine]) {
    let (_, columns) = Term::stdout().size();
    for line in lines {
        let prefix = match &line.app {
            Some(app) => format!("{} {}: ", line.timestamp.dimmed(), app.magenta()),
            None => format!("{}: ", line.timestamp.dimmed()),
        };
        let used = line.timestamp.width()
            + line.app.as_ref().map(|a| a.width() + 1).unwrap_or(0)
            + 2;
        let room = (columns as usize).saturating_sub(used).max(20);
        println!("{}{}", prefix, truncate_to_width(&line.text, room));
    }
}

pub(super) fn print_app_detail(app: &AppRecord) {
    println!("{}", app.name.bold());
    println!("--------------------------------");
    println!("  state      {}", colored_state(&app.state));
    println!("  version    {}", app.version.as_deref().unwrap_or("-"));
    println!("  subdomain  {}", app.subdomain.as_deref().unwrap_or("-"));
    println!(
        "  start      {}",
        app.scripts.start.as_deref().unwrap_or("-")
    );
    if let Some(owner) = &app.owner {
        println!("  owner      {}", owner);
    }
    if !app.snapshots.is_empty() {
        println!();
        print_snapshots(&app.snapshots, app.active_snapshot.as_deref());
    }
}

pub(super) fn print_snapshots(snapshots: &[Snapshot], active: Option<&str>) {
    for snapshot in snapshots {
        let marker = if active == Some(snapshot.id.as_str()) {
            ACTIVE_MARKER.green()
        } else {
            " ".normal()
        };
        println!(
            "  {} {}{}  {}",
            marker,
            pad(&snapshot.id, VERSION_WIDTH).yellow(),
            snapshot.short_checksum().dimmed(),
            format_time_ago(snapshot.ctime).dimmed()
        );
    }
}

pub(super) fn print_report(report: &DeploymentReport) {
    if report.created {
        println!("{}", format!("Created app {}", report.app).green());
    }
    if let Some(diff) = &report.diff {
        println!("{}", format!("Updated app {}", report.app).green());
        for (field, change) in diff.iter() {
            println!(
                "  {}: {} -> {}",
                field,
                change.old.as_deref().unwrap_or("(none)").dimmed(),
                change.new
            );
        }
    }
    if let Some(from) = &report.bumped_from {
        println!(
            "{}",
            format!("Version bumped from {} to {}", from, report.snapshot).yellow()
        );
    }
    if report.snapshot_reused {
        println!(
            "{}",
            format!("Snapshot {} is unchanged, reusing it", report.snapshot).dimmed()
        );
    }
    println!(
        "{}",
        format!("Activated snapshot {}", report.snapshot).green()
    );
    match &report.transition {
        Transition::Confirmed(state) => {
            println!("App {} is {}", report.app.bold(), colored_state(state))
        }
        Transition::Uncertain { observed } => println!(
            "{}",
            format!(
                "App {} has not confirmed the restart yet (last seen {}). It may still converge.",
                report.app, observed
            )
            .yellow()
        ),
    }
}

fn step_list(steps: &[Step]) -> String {
    if steps.is_empty() {
        return "none".to_string();
    }
    steps
        .iter()
        .map(Step::name)
        .collect::<Vec<_>>()
        .join(", ")
}

pub(super) fn print_cancelled(step: Step, completed: &[Step]) {
    println!(
        "{}",
        format!("Deployment cancelled at step {}.", step).yellow()
    );
    println!("  completed: {}", step_list(completed).dimmed());
}

pub(super) fn print_failure(failure: &DeployFailure) {
    eprintln!(
        "{} {}",
        "Deployment failed at step".red(),
        failure.step.name().red().bold()
    );
    eprintln!("  {}", failure.source);
    eprintln!("  completed: {}", step_list(&failure.session.completed));
    if let Some(snapshot) = &failure.session.snapshot {
        if failure.session.has_completed(Step::Activate) {
            eprintln!("  snapshot {} is active; the app was not restarted", snapshot);
        }
    }
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    Formatter::new().convert(duration.to_std().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_counts_terminal_columns() {
        assert_eq!(pad("ab", 4), "ab  ");
        assert_eq!(pad("日本", 6), "日本  ");
        assert_eq!(pad("toolong", 3), "toolong");
    }

    #[test]
    fn truncate_only_when_too_wide() {
        assert_eq!(truncate_to_width("hello", 5), "hello");
        assert_eq!(truncate_to_width("hello world", 6), "hello…");
        assert_eq!(truncate_to_width("日本語", 4), "日…");
    }

    #[test]
    fn latest_column_shows_newest_snapshot() {
        use drydock::model::{Checksum, Scripts};

        let mut app = AppRecord {
            name: "app1".into(),
            state: AppState::Started,
            subdomain: None,
            scripts: Scripts::default(),
            version: Some("1.0.1".into()),
            snapshots: Vec::new(),
            owner: None,
            active_snapshot: None,
        };
        assert_eq!(latest_column(&app), "---");

        let snapshot = |id: &str| Snapshot {
            id: id.into(),
            ctime: Utc::now(),
            checksum: Checksum::sha256("x"),
            app: "app1".into(),
        };
        app.snapshots = vec![snapshot("1.0.1"), snapshot("1.0.0")];
        assert_eq!(latest_column(&app), "1.0.1");
    }

    #[test]
    fn step_list_formats() {
        assert_eq!(step_list(&[]), "none");
        assert_eq!(
            step_list(&[Step::LoadManifest, Step::Reconcile]),
            "load_manifest, reconcile"
        );
    }
}

use crate::commands::lifecycle::Transition;
use crate::model::{AppRecord, Snapshot};

pub mod apps;
pub mod deploy;
pub mod helpers;
pub mod lifecycle;
pub mod logs;
pub mod snapshots;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub affected_apps: Vec<AppRecord>,
    pub listed_apps: Vec<AppRecord>,
    pub listed_snapshots: Vec<Snapshot>,
    /// Outcome of a start/stop/restart, if one was attempted.
    pub transition: Option<Transition>,
    pub log_lines: Vec<logs::LogLine>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_affected_apps(mut self, apps: Vec<AppRecord>) -> Self {
        self.affected_apps = apps;
        self
    }

    pub fn with_listed_apps(mut self, apps: Vec<AppRecord>) -> Self {
        self.listed_apps = apps;
        self
    }

    pub fn with_listed_snapshots(mut self, snapshots: Vec<Snapshot>) -> Self {
        self.listed_snapshots = snapshots;
        self
    }

    pub fn with_log_lines(mut self, lines: Vec<logs::LogLine>) -> Self {
        self.log_lines = lines;
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }

    pub fn has_warnings(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.level == MessageLevel::Warning)
    }
}

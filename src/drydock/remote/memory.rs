use super::Platform;
use crate::diff::{Field, ManifestDiff};
use crate::error::{DrydockError, Result};
use crate::model::{AppLogs, AppRecord, AppState, Checksum, LogEntry, Snapshot};
use crate::package;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

/// A mutating request as it was sent to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateApp(String),
    UpdateApp(String, ManifestDiff),
    DestroyApp(String),
    StartApp(String),
    StopApp(String),
    CreateSnapshot { app: String, version: String },
    ActivateSnapshot { app: String, version: String },
    DestroySnapshot { app: String, version: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetApp,
    ListApps,
    CreateApp,
    UpdateApp,
    DestroyApp,
    StartApp,
    StopApp,
    ListSnapshots,
    CreateSnapshot,
    ActivateSnapshot,
    DestroySnapshot,
    AppLogs,
    UserLogs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Unauthorized,
    Conflict,
    Unavailable,
}

impl Failure {
    fn into_error(self, op: Operation) -> DrydockError {
        let msg = format!("injected failure on {:?}", op);
        match self {
            Failure::NotFound => DrydockError::NotFound(msg),
            Failure::Unauthorized => DrydockError::Unauthorized(msg),
            Failure::Conflict => DrydockError::Conflict(msg),
            Failure::Unavailable => DrydockError::Unavailable(msg),
        }
    }
}

/// In-memory platform for testing and development.
/// Does NOT persist data.
pub struct InMemoryPlatform {
    owner: String,
    apps: BTreeMap<String, AppRecord>,
    snapshots: HashMap<String, Vec<Snapshot>>,
    failures: HashMap<Operation, Failure>,
    calls: Vec<Call>,
    logs: BTreeMap<String, Vec<LogEntry>>,
    settles: bool,
    reports_md5: bool,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            owner: "tester".to_string(),
            apps: BTreeMap::new(),
            snapshots: HashMap::new(),
            failures: HashMap::new(),
            calls: Vec::new(),
            logs: BTreeMap::new(),
            settles: true,
            reports_md5: false,
        }
    }

    pub fn with_app(mut self, record: AppRecord) -> Self {
        self.snapshots
            .entry(record.name.clone())
            .or_insert_with(|| record.snapshots.clone());
        self.apps.insert(record.name.clone(), record);
        self
    }

    /// Seed a snapshot as if it had been uploaded earlier.
    pub fn with_snapshot(mut self, app: &str, version: &str, bytes: &[u8]) -> Self {
        let snapshot = self.make_snapshot(app, version, bytes);
        self.snapshots
            .entry(app.to_string())
            .or_default()
            .insert(0, snapshot);
        self
    }

    /// Append log entries to `app`'s log.
    pub fn with_logs(mut self, app: &str, entries: &[(&str, &str)]) -> Self {
        self.logs
            .entry(app.to_string())
            .or_default()
            .extend(entries.iter().map(|(timestamp, text)| LogEntry {
                timestamp: timestamp.to_string(),
                text: text.to_string(),
            }));
        self
    }

    /// Report snapshot checksums as `md5` instead of SHA-256.
    pub fn reporting_md5(mut self) -> Self {
        self.reports_md5 = true;
        self
    }

    /// Make `op` fail with `failure` every time it is called.
    pub fn fail_on(mut self, op: Operation, failure: Failure) -> Self {
        self.failures.insert(op, failure);
        self
    }

    /// Start/stop requests leave the app in `starting`/`stopping` instead of
    /// completing immediately.
    pub fn unsettled(mut self) -> Self {
        self.settles = false;
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(*c)).count()
    }

    pub fn app(&self, name: &str) -> Option<&AppRecord> {
        self.apps.get(name)
    }

    fn check(&self, op: Operation) -> Result<()> {
        match self.failures.get(&op) {
            Some(failure) => Err(failure.into_error(op)),
            None => Ok(()),
        }
    }

    fn app_mut(&mut self, name: &str) -> Result<&mut AppRecord> {
        self.apps
            .get_mut(name)
            .ok_or_else(|| DrydockError::NotFound(format!("app {}", name)))
    }

    fn snapshots_of(&self, app: &str) -> Result<&Vec<Snapshot>> {
        if !self.apps.contains_key(app) {
            return Err(DrydockError::NotFound(format!("app {}", app)));
        }
        static EMPTY: Vec<Snapshot> = Vec::new();
        Ok(self.snapshots.get(app).unwrap_or(&EMPTY))
    }

    fn make_snapshot(&self, app: &str, version: &str, bytes: &[u8]) -> Snapshot {
        let checksum = if self.reports_md5 {
            Checksum::md5(package::md5_hex(bytes))
        } else {
            Checksum::sha256(package::checksum(bytes))
        };
        Snapshot {
            id: version.to_string(),
            ctime: Utc::now(),
            checksum,
            app: app.to_string(),
        }
    }

    fn transition(&mut self, name: &str, settled: AppState, pending: &str) -> Result<()> {
        let settles = self.settles;
        let app = self.app_mut(name)?;
        app.state = if settles {
            settled
        } else {
            AppState::Other(pending.to_string())
        };
        Ok(())
    }
}

impl Platform for InMemoryPlatform {
    fn get_app(&self, name: &str) -> Result<AppRecord> {
        self.check(Operation::GetApp)?;
        let mut record = self
            .apps
            .get(name)
            .cloned()
            .ok_or_else(|| DrydockError::NotFound(format!("app {}", name)))?;
        record.snapshots = self.snapshots.get(name).cloned().unwrap_or_default();
        Ok(record)
    }

    fn list_apps(&self) -> Result<Vec<AppRecord>> {
        self.check(Operation::ListApps)?;
        Ok(self
            .apps
            .values()
            .map(|app| {
                let mut record = app.clone();
                record.snapshots = self.snapshots.get(&app.name).cloned().unwrap_or_default();
                record
            })
            .collect())
    }

    fn create_app(&mut self, record: &AppRecord) -> Result<AppRecord> {
        self.calls.push(Call::CreateApp(record.name.clone()));
        self.check(Operation::CreateApp)?;
        if self.apps.contains_key(&record.name) {
            return Err(DrydockError::Conflict(format!(
                "app {} already exists",
                record.name
            )));
        }
        let mut stored = record.clone();
        stored.owner = Some(self.owner.clone());
        self.apps.insert(stored.name.clone(), stored.clone());
        Ok(stored)
    }

    fn update_app(&mut self, name: &str, diff: &ManifestDiff) -> Result<()> {
        self.calls
            .push(Call::UpdateApp(name.to_string(), diff.clone()));
        self.check(Operation::UpdateApp)?;

        let mut record = self
            .apps
            .remove(name)
            .ok_or_else(|| DrydockError::NotFound(format!("app {}", name)))?;
        for (field, change) in diff.iter() {
            let value = Some(change.new.clone());
            match field {
                Field::Name => record.name = change.new.clone(),
                Field::Subdomain => record.subdomain = value,
                Field::Start => record.scripts.start = value,
                Field::Version => record.version = value,
            }
        }
        if record.name != name {
            if let Some(snaps) = self.snapshots.remove(name) {
                self.snapshots.insert(record.name.clone(), snaps);
            }
        }
        self.apps.insert(record.name.clone(), record);
        Ok(())
    }

    fn destroy_app(&mut self, name: &str) -> Result<()> {
        self.calls.push(Call::DestroyApp(name.to_string()));
        self.check(Operation::DestroyApp)?;
        self.apps
            .remove(name)
            .ok_or_else(|| DrydockError::NotFound(format!("app {}", name)))?;
        self.snapshots.remove(name);
        Ok(())
    }

    fn start_app(&mut self, name: &str) -> Result<()> {
        self.calls.push(Call::StartApp(name.to_string()));
        self.check(Operation::StartApp)?;
        self.transition(name, AppState::Started, "starting")
    }

    fn stop_app(&mut self, name: &str) -> Result<()> {
        self.calls.push(Call::StopApp(name.to_string()));
        self.check(Operation::StopApp)?;
        self.transition(name, AppState::Stopped, "stopping")
    }

    fn list_snapshots(&self, app: &str) -> Result<Vec<Snapshot>> {
        self.check(Operation::ListSnapshots)?;
        Ok(self.snapshots_of(app)?.clone())
    }

    fn create_snapshot(&mut self, app: &str, version: &str, bytes: &[u8]) -> Result<Snapshot> {
        self.calls.push(Call::CreateSnapshot {
            app: app.to_string(),
            version: version.to_string(),
        });
        self.check(Operation::CreateSnapshot)?;
        if self.snapshots_of(app)?.iter().any(|s| s.id == version) {
            return Err(DrydockError::Conflict(format!(
                "snapshot {} already exists for {}",
                version, app
            )));
        }

        let snapshot = self.make_snapshot(app, version, bytes);
        self.snapshots
            .entry(app.to_string())
            .or_default()
            .insert(0, snapshot.clone());
        Ok(snapshot)
    }

    fn activate_snapshot(&mut self, app: &str, version: &str) -> Result<()> {
        self.calls.push(Call::ActivateSnapshot {
            app: app.to_string(),
            version: version.to_string(),
        });
        self.check(Operation::ActivateSnapshot)?;
        if !self.snapshots_of(app)?.iter().any(|s| s.id == version) {
            return Err(DrydockError::NotFound(format!(
                "snapshot {} of {}",
                version, app
            )));
        }
        self.app_mut(app)?.active_snapshot = Some(version.to_string());
        Ok(())
    }

    fn destroy_snapshot(&mut self, app: &str, version: &str) -> Result<()> {
        self.calls.push(Call::DestroySnapshot {
            app: app.to_string(),
            version: version.to_string(),
        });
        self.check(Operation::DestroySnapshot)?;
        self.snapshots_of(app)?;

        let snaps = self.snapshots.entry(app.to_string()).or_default();
        let before = snaps.len();
        snaps.retain(|s| s.id != version);
        if snaps.len() == before {
            return Err(DrydockError::NotFound(format!(
                "snapshot {} of {}",
                version, app
            )));
        }

        let record = self.app_mut(app)?;
        if record.active_snapshot.as_deref() == Some(version) {
            record.active_snapshot = None;
        }
        Ok(())
    }

    fn app_logs(&self, app: &str, lines: usize) -> Result<Vec<LogEntry>> {
        self.check(Operation::AppLogs)?;
        if !self.apps.contains_key(app) {
            return Err(DrydockError::NotFound(format!("app {}", app)));
        }
        Ok(tail(self.logs.get(app).map(Vec::as_slice).unwrap_or(&[]), lines))
    }

    fn user_logs(&self, lines: usize) -> Result<Vec<AppLogs>> {
        self.check(Operation::UserLogs)?;
        Ok(self
            .apps
            .keys()
            .map(|name| AppLogs {
                app: name.clone(),
                entries: tail(self.logs.get(name).map(Vec::as_slice).unwrap_or(&[]), lines),
            })
            .collect())
    }
}

fn tail(entries: &[LogEntry], lines: usize) -> Vec<LogEntry> {
    entries[entries.len().saturating_sub(lines)..].to_vec()
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::manifest::DEFAULT_START;
    use crate::model::Scripts;

    /// A remote record matching a `package.json` with only `name` and `version`.
    pub fn record(name: &str, version: &str, state: AppState) -> AppRecord {
        AppRecord {
            name: name.to_string(),
            state,
            subdomain: Some(name.to_string()),
            scripts: Scripts {
                start: Some(DEFAULT_START.to_string()),
            },
            version: Some(version.to_string()),
            snapshots: Vec::new(),
            owner: Some("tester".to_string()),
            active_snapshot: None,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared run state of an application as reported by the platform.
///
/// Only authoritative right after a read; any mutating call makes it stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppState {
    Stopped,
    Started,
    /// Transitional or unrecognised states (`starting`, `stopping`, ...).
    Other(String),
}

impl Default for AppState {
    fn default() -> Self {
        AppState::Other("unknown".to_string())
    }
}

impl From<String> for AppState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stopped" => AppState::Stopped,
            "started" => AppState::Started,
            _ => AppState::Other(s),
        }
    }
}

impl From<AppState> for String {
    fn from(state: AppState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppState::Stopped => write!(f, "stopped"),
            AppState::Started => write!(f, "started"),
            AppState::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scripts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
}

/// An application record on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: AppState,
    #[serde(default)]
    pub subdomain: Option<String>,
    #[serde(default)]
    pub scripts: Scripts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Most recent first.
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_snapshot: Option<String>,
}

impl AppRecord {
    /// A fresh record for `manifest`, created in the `stopped` state.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self {
            name: manifest.name.clone(),
            state: AppState::Stopped,
            subdomain: manifest.subdomain.clone(),
            scripts: Scripts {
                start: Some(manifest.start.clone()),
            },
            version: Some(manifest.version.clone()),
            snapshots: Vec::new(),
            owner: None,
            active_snapshot: None,
        }
    }

    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Md5,
}

/// A hex digest together with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub algorithm: ChecksumAlgorithm,
    pub value: String,
}

impl Checksum {
    pub fn sha256(value: impl Into<String>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Sha256,
            value: value.into(),
        }
    }

    pub fn md5(value: impl Into<String>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Md5,
            value: value.into(),
        }
    }

    /// First 12 characters of the digest.
    pub fn short(&self) -> &str {
        match self.value.char_indices().nth(12) {
            Some((end, _)) => &self.value[..end],
            None => &self.value,
        }
    }
}

/// An immutable, versioned archive of application source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotWire", into = "SnapshotWire")]
pub struct Snapshot {
    pub id: String,
    pub ctime: DateTime<Utc>,
    pub checksum: Checksum,
    pub app: String,
}

impl Snapshot {
    pub fn short_checksum(&self) -> &str {
        self.checksum.short()
    }
}

/// On the wire a snapshot carries either a SHA-256 `checksum` or an `md5`.
#[derive(Serialize, Deserialize)]
struct SnapshotWire {
    id: String,
    ctime: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    md5: Option<String>,
    #[serde(default)]
    app: String,
}

impl TryFrom<SnapshotWire> for Snapshot {
    type Error = String;

    fn try_from(wire: SnapshotWire) -> Result<Self, Self::Error> {
        let checksum = match (wire.checksum, wire.md5) {
            (Some(sha), _) => Checksum::sha256(sha),
            (None, Some(md5)) => Checksum::md5(md5),
            (None, None) => return Err(format!("snapshot {} has no checksum", wire.id)),
        };
        Ok(Snapshot {
            id: wire.id,
            ctime: wire.ctime,
            checksum,
            app: wire.app,
        })
    }
}

impl From<Snapshot> for SnapshotWire {
    fn from(snapshot: Snapshot) -> Self {
        let (checksum, md5) = match snapshot.checksum.algorithm {
            ChecksumAlgorithm::Sha256 => (Some(snapshot.checksum.value), None),
            ChecksumAlgorithm::Md5 => (None, Some(snapshot.checksum.value)),
        };
        SnapshotWire {
            id: snapshot.id,
            ctime: snapshot.ctime,
            checksum,
            md5,
            app: snapshot.app,
        }
    }
}

/// The local application descriptor. `start` is already defaulted; a missing
/// `subdomain` is asked for when the app is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub subdomain: Option<String>,
    pub start: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub text: String,
}

/// Log entries of one app, as returned by an account-wide query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLogs {
    pub app: String,
    pub entries: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_parses_known_and_transitional() {
        let started: AppState = serde_json::from_str("\"started\"").unwrap();
        assert_eq!(started, AppState::Started);
        let starting: AppState = serde_json::from_str("\"starting\"").unwrap();
        assert_eq!(starting, AppState::Other("starting".into()));
        assert_eq!(serde_json::to_string(&AppState::Stopped).unwrap(), "\"stopped\"");
    }

    #[test]
    fn record_tolerates_sparse_payloads() {
        let record: AppRecord = serde_json::from_str(r#"{"name":"app1"}"#).unwrap();
        assert_eq!(record.state, AppState::Other("unknown".into()));
        assert!(record.snapshots.is_empty());
        assert!(record.scripts.start.is_none());
    }

    #[test]
    fn snapshot_keeps_sha256_checksum() {
        let snap: Snapshot = serde_json::from_str(
            r#"{"id":"1.0.0","ctime":"2024-01-01T00:00:00Z","checksum":"abc","md5":"def"}"#,
        )
        .unwrap();
        assert_eq!(snap.checksum, Checksum::sha256("abc"));
    }

    #[test]
    fn snapshot_keeps_md5_algorithm() {
        let snap: Snapshot = serde_json::from_str(
            r#"{"id":"1.0.0","ctime":"2024-01-01T00:00:00Z","md5":"abc"}"#,
        )
        .unwrap();
        assert_eq!(snap.checksum.algorithm, ChecksumAlgorithm::Md5);
        assert_eq!(
            serde_json::to_value(&snap).unwrap()["md5"],
            serde_json::json!("abc")
        );
    }

    #[test]
    fn snapshot_without_checksum_is_rejected() {
        let parsed: Result<Snapshot, _> =
            serde_json::from_str(r#"{"id":"1.0.0","ctime":"2024-01-01T00:00:00Z"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn short_checksum_respects_char_boundaries() {
        assert_eq!(Checksum::sha256("0123456789abcdef").short(), "0123456789ab");
        assert_eq!(Checksum::md5("ééééééééééééé").short(), "éééééééééééé");
        assert_eq!(Checksum::md5("abc").short(), "abc");
    }

    #[test]
    fn new_record_starts_stopped() {
        let manifest = Manifest {
            name: "app1".into(),
            version: "1.0.1".into(),
            subdomain: Some("app1".into()),
            start: "node server.js".into(),
        };
        let record = AppRecord::from_manifest(&manifest);
        assert_eq!(record.state, AppState::Stopped);
        assert_eq!(record.version.as_deref(), Some("1.0.1"));
    }
}

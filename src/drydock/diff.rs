//! # Manifest Differ
//!
//! Compares the user-editable fields of a local [`Manifest`] against the remote
//! [`AppRecord`]. Server-assigned fields (state, owner, snapshots) are never
//! compared. An empty diff means "no update needed" and callers must skip the
//! update call entirely.

use crate::model::{AppRecord, Manifest};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Subdomain,
    Start,
    Version,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Subdomain => "subdomain",
            Field::Start => "scripts.start",
            Field::Version => "version",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub old: Option<String>,
    pub new: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    changes: BTreeMap<Field, FieldChange>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, field: Field) -> Option<&FieldChange> {
        self.changes.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &FieldChange)> {
        self.changes.iter()
    }

    pub fn with_change(mut self, field: Field, old: Option<String>, new: String) -> Self {
        self.changes.insert(field, FieldChange { old, new });
        self
    }

    /// Request body for an update: only the changed fields, nested the way the
    /// platform stores them.
    pub fn to_update_body(&self) -> Value {
        let mut body = Map::new();
        for (field, change) in &self.changes {
            match field {
                Field::Start => {
                    body.insert("scripts".to_string(), json!({ "start": change.new }));
                }
                other => {
                    body.insert(other.as_str().to_string(), json!(change.new));
                }
            }
        }
        Value::Object(body)
    }
}

/// Fields of `local` that differ from `remote`. A subdomain the manifest leaves
/// out is not compared.
pub fn diff(remote: &AppRecord, local: &Manifest) -> ManifestDiff {
    let mut out = ManifestDiff::default();

    let pairs: [(Field, Option<&str>, Option<&str>); 4] = [
        (Field::Name, Some(remote.name.as_str()), Some(local.name.as_str())),
        (
            Field::Subdomain,
            remote.subdomain.as_deref(),
            local.subdomain.as_deref(),
        ),
        (Field::Start, remote.scripts.start.as_deref(), Some(local.start.as_str())),
        (Field::Version, remote.version.as_deref(), Some(local.version.as_str())),
    ];

    for (field, old, new) in pairs {
        if let Some(new) = new {
            if old != Some(new) {
                out = out.with_change(field, old.map(str::to_string), new.to_string());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppState, Scripts};

    fn manifest() -> Manifest {
        Manifest {
            name: "app1".into(),
            version: "1.0.1".into(),
            subdomain: Some("app1".into()),
            start: "server.js".into(),
        }
    }

    fn matching_record() -> AppRecord {
        let mut record = AppRecord::from_manifest(&manifest());
        record.state = AppState::Started;
        record.owner = Some("tester".into());
        record
    }

    #[test]
    fn identical_fields_produce_empty_diff() {
        assert!(diff(&matching_record(), &manifest()).is_empty());
    }

    #[test]
    fn remote_only_fields_are_ignored() {
        let mut record = matching_record();
        record.state = AppState::Other("starting".into());
        record.owner = Some("someone-else".into());
        record.active_snapshot = Some("0.0.1".into());
        assert!(diff(&record, &manifest()).is_empty());
    }

    #[test]
    fn reports_only_changed_fields() {
        let mut record = matching_record();
        record.version = Some("1.0.0".into());
        record.scripts = Scripts {
            start: Some("old.js".into()),
        };

        let d = diff(&record, &manifest());
        assert_eq!(d.len(), 2);
        assert_eq!(
            d.get(Field::Version),
            Some(&FieldChange {
                old: Some("1.0.0".into()),
                new: "1.0.1".into()
            })
        );
        assert!(d.get(Field::Subdomain).is_none());
    }

    #[test]
    fn missing_remote_value_counts_as_change() {
        let mut record = matching_record();
        record.subdomain = None;
        let d = diff(&record, &manifest());
        assert_eq!(d.get(Field::Subdomain).unwrap().old, None);
    }

    #[test]
    fn undeclared_subdomain_is_not_compared() {
        let mut local = manifest();
        local.subdomain = None;
        let mut record = matching_record();
        record.subdomain = Some("chosen-at-create".into());
        assert!(diff(&record, &local).is_empty());
    }

    #[test]
    fn update_body_nests_start_script() {
        let d = ManifestDiff::default()
            .with_change(Field::Start, None, "server.js".into())
            .with_change(Field::Version, Some("1.0.0".into()), "1.0.1".into());
        assert_eq!(
            d.to_update_body(),
            json!({ "scripts": { "start": "server.js" }, "version": "1.0.1" })
        );
    }
}

//! Reads the local `package.json` that describes an application.

use crate::error::{DrydockError, Result};
use crate::model::Manifest;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILENAME: &str = "package.json";
pub const DEFAULT_START: &str = "node server.js";

#[derive(Debug, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    subdomain: Option<String>,
    #[serde(default)]
    scripts: PackageScripts,
}

#[derive(Debug, Default, Deserialize)]
struct PackageScripts {
    start: Option<String>,
}

/// Load the manifest from `dir`, defaulting `scripts.start`.
pub fn read<P: AsRef<Path>>(dir: P) -> Result<Manifest> {
    let path = dir.as_ref().join(MANIFEST_FILENAME);
    let content = fs::read_to_string(&path).map_err(|e| {
        DrydockError::Manifest(format!("cannot read {}: {}", path.display(), e))
    })?;
    let pkg: PackageJson = serde_json::from_str(&content)
        .map_err(|e| DrydockError::Manifest(format!("invalid {}: {}", path.display(), e)))?;

    let name = required(pkg.name, "name")?;
    let version = required(pkg.version, "version")?;
    let subdomain = pkg.subdomain.filter(|s| !s.trim().is_empty());
    let start = pkg
        .scripts
        .start
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_START.to_string());

    Ok(Manifest {
        name,
        version,
        subdomain,
        start,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DrydockError::Manifest(format!(
            "missing required field `{}`",
            field
        ))),
    }
}

/// Rewrite the `version` field in place, leaving every other key untouched.
pub fn write_version<P: AsRef<Path>>(dir: P, version: &str) -> Result<()> {
    let path = dir.as_ref().join(MANIFEST_FILENAME);
    let content = fs::read_to_string(&path)?;
    let mut value: serde_json::Value = serde_json::from_str(&content)?;
    match value.as_object_mut() {
        Some(obj) => {
            obj.insert(
                "version".to_string(),
                serde_json::Value::String(version.to_string()),
            );
        }
        None => {
            return Err(DrydockError::Manifest(format!(
                "{} is not a JSON object",
                path.display()
            )))
        }
    }
    fs::write(&path, serde_json::to_string_pretty(&value)?)?;
    Ok(())
}

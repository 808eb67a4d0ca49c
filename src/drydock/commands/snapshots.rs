use crate::commands::{CmdMessage, CmdResult};
use crate::error::{DrydockError, Result};
use crate::manifest;
use crate::model::Snapshot;
use crate::package;
use crate::prompt::Prompter;
use crate::remote::Platform;
use std::path::Path;
use tracing::{debug, info};

/// Pick the snapshot an operation targets.
///
/// With `requested`, only an exact id match is accepted. Without it, a single
/// snapshot is used as-is and several are offered to the prompter. The selector
/// never falls back to a default.
pub fn resolve<P: Platform, R: Prompter>(
    platform: &P,
    prompter: &mut R,
    app: &str,
    requested: Option<&str>,
) -> Result<Snapshot> {
    let mut snapshots = platform.list_snapshots(app)?;

    if let Some(id) = requested {
        return snapshots
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| DrydockError::NotFound(format!("snapshot {} of {}", id, app)));
    }

    match snapshots.len() {
        0 => Err(DrydockError::NotFound(format!("no snapshots for {}", app))),
        1 => Ok(snapshots.remove(0)),
        n => {
            let labels: Vec<String> = snapshots.iter().map(label).collect();
            let picked = prompter.choose(&format!("Which snapshot of {}?", app), &labels)?;
            if picked >= n {
                return Err(DrydockError::InvalidSelection(format!(
                    "{} is not one of the {} snapshots of {}",
                    picked, n, app
                )));
            }
            Ok(snapshots.remove(picked))
        }
    }
}

fn label(snapshot: &Snapshot) -> String {
    format!(
        "{}  {}  {}",
        snapshot.id,
        snapshot.ctime.format("%Y-%m-%d %H:%M"),
        snapshot.short_checksum()
    )
}

pub fn list<P: Platform>(platform: &P, app: &str) -> Result<CmdResult> {
    let snapshots = platform.list_snapshots(app)?;
    let mut result = CmdResult::default();
    if snapshots.is_empty() {
        result.add_message(CmdMessage::info(format!("No snapshots for {}.", app)));
    }
    Ok(result.with_listed_snapshots(snapshots))
}

/// Package `dir` and upload it without activating. The snapshot id defaults to
/// the manifest version.
pub fn create<P: Platform>(platform: &mut P, dir: &Path, version: Option<String>) -> Result<CmdResult> {
    let manifest = manifest::read(dir)?;
    let version = version.unwrap_or_else(|| manifest.version.clone());

    let archive = package::pack(dir)?;
    debug!(app = %manifest.name, bytes = archive.bytes.len(), checksum = %archive.checksum, "packaged");
    let snapshot = platform.create_snapshot(&manifest.name, &version, &archive.bytes)?;
    info!(app = %manifest.name, snapshot = %snapshot.id, "snapshot uploaded");

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Created snapshot {} for {}",
        snapshot.id, manifest.name
    )));
    Ok(result.with_listed_snapshots(vec![snapshot]))
}

pub fn activate<P: Platform, R: Prompter>(
    platform: &mut P,
    prompter: &mut R,
    app: &str,
    requested: Option<&str>,
) -> Result<CmdResult> {
    let snapshot = resolve(platform, prompter, app, requested)?;
    platform.activate_snapshot(app, &snapshot.id)?;
    info!(app, snapshot = %snapshot.id, "snapshot activated");

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Activated snapshot {} for {}",
        snapshot.id, app
    )));
    Ok(result.with_listed_snapshots(vec![snapshot]))
}

/// Selecting a snapshot never authorises destroying it; that takes a separate
/// confirmation or `skip_confirm`.
pub fn destroy<P: Platform, R: Prompter>(
    platform: &mut P,
    prompter: &mut R,
    app: &str,
    requested: Option<&str>,
    skip_confirm: bool,
) -> Result<CmdResult> {
    let snapshot = resolve(platform, prompter, app, requested)?;

    if !skip_confirm {
        let prompt = format!("Permanently destroy snapshot {} of {}?", snapshot.id, app);
        if !prompter.confirm(&prompt)? {
            let mut res = CmdResult::default();
            res.add_message(CmdMessage::info("Operation cancelled."));
            return Ok(res);
        }
    }

    platform.destroy_snapshot(app, &snapshot.id)?;
    info!(app, snapshot = %snapshot.id, "snapshot destroyed");

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Destroyed snapshot {} of {}",
        snapshot.id, app
    )));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AppState;
    use crate::prompt::{Answer, ScriptedPrompter};
    use crate::remote::memory::fixtures::record;
    use crate::remote::memory::{Call, Failure, InMemoryPlatform, Operation};
    use std::fs;
    use tempfile::tempdir;

    fn platform_with(versions: &[&str]) -> InMemoryPlatform {
        let mut platform =
            InMemoryPlatform::new().with_app(record("app1", "1.0.0", AppState::Stopped));
        for v in versions {
            platform = platform.with_snapshot("app1", v, v.as_bytes());
        }
        platform
    }

    #[test]
    fn requested_id_must_match_exactly() {
        let platform = platform_with(&["1.0.0", "1.0.1"]);
        let mut prompter = ScriptedPrompter::silent();

        let snap = resolve(&platform, &mut prompter, "app1", Some("1.0.0")).unwrap();
        assert_eq!(snap.id, "1.0.0");

        let err = resolve(&platform, &mut prompter, "app1", Some("1.0")).unwrap_err();
        assert!(err.is_not_found());
        assert!(prompter.prompts.is_empty());
    }

    #[test]
    fn single_snapshot_is_used_without_prompting() {
        let platform = platform_with(&["1.0.0"]);
        let mut prompter = ScriptedPrompter::silent();
        let snap = resolve(&platform, &mut prompter, "app1", None).unwrap();
        assert_eq!(snap.id, "1.0.0");
        assert!(prompter.prompts.is_empty());
    }

    #[test]
    fn no_snapshots_is_not_found() {
        let platform = platform_with(&[]);
        let mut prompter = ScriptedPrompter::silent();
        assert!(resolve(&platform, &mut prompter, "app1", None)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn several_snapshots_prompt_exactly_once() {
        let platform = platform_with(&["1.0.0", "1.0.1", "1.0.2"]);
        let mut prompter = ScriptedPrompter::new([Answer::Choose(1)]);
        let snap = resolve(&platform, &mut prompter, "app1", None).unwrap();
        // Most recent first: 1.0.2, 1.0.1, 1.0.0
        assert_eq!(snap.id, "1.0.1");
        assert_eq!(prompter.prompts.len(), 1);
    }

    #[test]
    fn out_of_range_choice_is_invalid() {
        let platform = platform_with(&["1.0.0", "1.0.1"]);
        let mut prompter = ScriptedPrompter::new([Answer::Choose(5)]);
        assert!(matches!(
            resolve(&platform, &mut prompter, "app1", None),
            Err(DrydockError::InvalidSelection(_))
        ));
    }

    #[test]
    fn cancelled_choice_propagates() {
        let platform = platform_with(&["1.0.0", "1.0.1"]);
        let mut prompter = ScriptedPrompter::new([Answer::Cancel]);
        assert!(resolve(&platform, &mut prompter, "app1", None)
            .unwrap_err()
            .is_cancelled());
    }

    #[test]
    fn listing_failure_is_not_retried() {
        let platform = platform_with(&["1.0.0"]).fail_on(Operation::ListSnapshots, Failure::Unavailable);
        let mut prompter = ScriptedPrompter::silent();
        assert!(matches!(
            resolve(&platform, &mut prompter, "app1", None),
            Err(DrydockError::Unavailable(_))
        ));
    }

    #[test]
    fn destroy_requires_confirmation_after_selection() {
        let mut platform = platform_with(&["1.0.0", "1.0.1"]);
        let mut prompter = ScriptedPrompter::new([Answer::Choose(0), Answer::Confirm(false)]);
        let res = destroy(&mut platform, &mut prompter, "app1", None, false).unwrap();
        assert_eq!(res.messages[0].content, "Operation cancelled.");
        assert_eq!(prompter.prompts.len(), 2);
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn destroy_with_skip_confirm() {
        let mut platform = platform_with(&["1.0.0"]);
        let mut prompter = ScriptedPrompter::silent();
        destroy(&mut platform, &mut prompter, "app1", Some("1.0.0"), true).unwrap();
        assert_eq!(
            platform.calls(),
            &[Call::DestroySnapshot {
                app: "app1".into(),
                version: "1.0.0".into()
            }]
        );
    }

    #[test]
    fn activate_selected_snapshot() {
        let mut platform = platform_with(&["1.0.0", "1.0.1"]);
        let mut prompter = ScriptedPrompter::new([Answer::Choose(0)]);
        activate(&mut platform, &mut prompter, "app1", None).unwrap();
        assert_eq!(
            platform.app("app1").unwrap().active_snapshot.as_deref(),
            Some("1.0.1")
        );
    }

    #[test]
    fn create_uploads_under_manifest_version_without_activating() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name":"app1","version":"1.2.0"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("server.js"), "listen()").unwrap();

        let mut platform = platform_with(&[]);
        let res = create(&mut platform, dir.path(), None).unwrap();
        assert_eq!(res.listed_snapshots[0].id, "1.2.0");
        assert_eq!(
            platform.calls(),
            &[Call::CreateSnapshot {
                app: "app1".into(),
                version: "1.2.0".into()
            }]
        );
        assert_eq!(platform.app("app1").unwrap().active_snapshot, None);
    }
}

//! # Deployment Sequencer
//!
//! Runs the fixed deployment pipeline against a [`Platform`]:
//!
//! 1. [`Step::LoadManifest`]: read `package.json`
//! 2. [`Step::Reconcile`]: create the app (asking for a subdomain if none is
//!    declared), or update only the fields that changed
//! 3. [`Step::Package`]: build the archive and decide the snapshot version
//! 4. [`Step::Upload`]: upload the snapshot (skipped when an identical one exists)
//! 5. [`Step::Activate`]: activate the snapshot
//! 6. [`Step::Restart`]: stop and start the app through [`Lifecycle`]
//!
//! Each step runs only if the previous one succeeded. The platform has no
//! transactions, so a failure leaves earlier steps applied: [`DeployFailure`]
//! carries the failing step and the [`DeploymentSession`] log of completed
//! steps so the caller can say exactly what happened. Nothing is rolled back
//! or retried.
//!
//! A cancelled prompt is a clean stop, reported as [`Deployment::Cancelled`].

use crate::commands::helpers::ensure_subdomain;
use crate::commands::lifecycle::{Lifecycle, Transition};
use crate::diff::{self, Field, ManifestDiff};
use crate::error::DrydockError;
use crate::manifest;
use crate::model::{AppRecord, Manifest, Snapshot};
use crate::package::{self, Archive};
use crate::prompt::Prompter;
use crate::remote::Platform;
use semver::{Prerelease, Version};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    LoadManifest,
    Reconcile,
    Package,
    Upload,
    Activate,
    Restart,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::LoadManifest => "load_manifest",
            Step::Reconcile => "reconcile",
            Step::Package => "package",
            Step::Upload => "upload",
            Step::Activate => "activate",
            Step::Restart => "restart",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress of one deployment. Lives for a single invocation.
#[derive(Debug, Clone, Default)]
pub struct DeploymentSession {
    pub app: Option<String>,
    pub manifest: Option<Manifest>,
    pub diff: Option<ManifestDiff>,
    pub snapshot: Option<String>,
    pub completed: Vec<Step>,
}

impl DeploymentSession {
    fn complete(&mut self, step: Step) {
        debug!(step = step.name(), "step completed");
        self.completed.push(step);
    }

    pub fn has_completed(&self, step: Step) -> bool {
        self.completed.contains(&step)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentReport {
    pub app: String,
    pub created: bool,
    /// The update that was applied to an existing app, if any.
    pub diff: Option<ManifestDiff>,
    pub snapshot: String,
    pub snapshot_reused: bool,
    /// Set when a content collision moved the deploy to a new prerelease.
    pub bumped_from: Option<String>,
    pub transition: Transition,
}

#[derive(Debug)]
pub enum Deployment {
    Deployed(DeploymentReport),
    Cancelled { step: Step, completed: Vec<Step> },
}

#[derive(Debug, Error)]
#[error("deployment failed at step `{step}`: {source}")]
pub struct DeployFailure {
    pub step: Step,
    #[source]
    pub source: DrydockError,
    pub session: DeploymentSession,
}

type StepResult<T> = std::result::Result<T, (Step, DrydockError)>;

fn at(step: Step) -> impl FnOnce(DrydockError) -> (Step, DrydockError) {
    move |err| (step, err)
}

pub fn run<P: Platform, R: Prompter>(
    platform: &mut P,
    prompter: &mut R,
    dir: &Path,
) -> Result<Deployment, DeployFailure> {
    let mut session = DeploymentSession::default();

    match pipeline(platform, prompter, dir, &mut session) {
        Ok(report) => Ok(Deployment::Deployed(report)),
        Err((step, DrydockError::Cancelled)) => {
            info!(step = step.name(), "deployment cancelled");
            Ok(Deployment::Cancelled {
                step,
                completed: session.completed,
            })
        }
        Err((step, source)) => {
            warn!(step = step.name(), error = %source, "deployment failed");
            Err(DeployFailure {
                step,
                source,
                session,
            })
        }
    }
}

fn pipeline<P: Platform, R: Prompter>(
    platform: &mut P,
    prompter: &mut R,
    dir: &Path,
    session: &mut DeploymentSession,
) -> StepResult<DeploymentReport> {
    // 1. Load manifest
    let mut manifest = manifest::read(dir).map_err(at(Step::LoadManifest))?;
    let app = manifest.name.clone();
    session.app = Some(app.clone());
    session.manifest = Some(manifest.clone());
    session.complete(Step::LoadManifest);

    // 2. Reconcile
    let (created, applied) =
        reconcile(platform, prompter, &mut manifest).map_err(at(Step::Reconcile))?;
    session.manifest = Some(manifest.clone());
    session.diff = applied.clone();
    session.complete(Step::Reconcile);

    // 3. Package
    let mut archive = package::pack(dir).map_err(at(Step::Package))?;
    debug!(app = %app, bytes = archive.bytes.len(), checksum = %archive.checksum, "packaged");
    let existing = if created {
        Vec::new()
    } else {
        platform.list_snapshots(&app).map_err(at(Step::Package))?
    };
    let target = choose_version(platform, prompter, dir, &manifest, &archive, &existing)
        .map_err(at(Step::Package))?;
    if target.bumped_from.is_some() {
        // The archive must carry the bumped package.json.
        archive = package::pack(dir).map_err(at(Step::Package))?;
        debug!(app = %app, checksum = %archive.checksum, "repackaged after version bump");
    }
    session.snapshot = Some(target.version.clone());
    session.complete(Step::Package);

    // 4. Upload
    if target.reused {
        info!(app = %app, snapshot = %target.version, "identical snapshot exists, skipping upload");
    } else {
        platform
            .create_snapshot(&app, &target.version, &archive.bytes)
            .map_err(at(Step::Upload))?;
        info!(app = %app, snapshot = %target.version, "snapshot uploaded");
    }
    session.complete(Step::Upload);

    // 5. Activate
    platform
        .activate_snapshot(&app, &target.version)
        .map_err(at(Step::Activate))?;
    info!(app = %app, snapshot = %target.version, "snapshot activated");
    session.complete(Step::Activate);

    // 6. Restart
    let transition = Lifecycle::new(app.clone())
        .restart(platform)
        .map_err(at(Step::Restart))?;
    session.complete(Step::Restart);

    Ok(DeploymentReport {
        app,
        created,
        diff: applied,
        snapshot: target.version,
        snapshot_reused: target.reused,
        bumped_from: target.bumped_from,
        transition,
    })
}

/// Create the app if it does not exist, otherwise push only the changed fields.
fn reconcile<P: Platform, R: Prompter>(
    platform: &mut P,
    prompter: &mut R,
    manifest: &mut Manifest,
) -> crate::error::Result<(bool, Option<ManifestDiff>)> {
    match platform.get_app(&manifest.name) {
        Ok(remote) => {
            let changes = diff::diff(&remote, manifest);
            if changes.is_empty() {
                debug!(app = %manifest.name, "remote app is up to date");
                return Ok((false, None));
            }
            platform.update_app(&manifest.name, &changes)?;
            info!(app = %manifest.name, fields = changes.len(), "app updated");
            Ok((false, Some(changes)))
        }
        Err(e) if e.is_not_found() => {
            ensure_subdomain(prompter, manifest)?;
            platform.create_app(&AppRecord::from_manifest(manifest))?;
            info!(app = %manifest.name, "app created");
            Ok((true, None))
        }
        Err(e) => Err(e),
    }
}

struct Target {
    version: String,
    reused: bool,
    bumped_from: Option<String>,
}

fn choose_version<P: Platform, R: Prompter>(
    platform: &mut P,
    prompter: &mut R,
    dir: &Path,
    manifest: &Manifest,
    archive: &Archive,
    existing: &[Snapshot],
) -> crate::error::Result<Target> {
    let version = manifest.version.clone();

    let Some(current) = existing.iter().find(|s| s.id == version) else {
        return Ok(Target {
            version,
            reused: false,
            bumped_from: None,
        });
    };

    if archive.matches(&current.checksum) {
        return Ok(Target {
            version,
            reused: true,
            bumped_from: None,
        });
    }

    let next = next_prerelease(&version, existing)?;
    let prompt = format!(
        "Snapshot {} of {} already exists with different contents. Deploy as {}?",
        version, manifest.name, next
    );
    if !prompter.confirm(&prompt)? {
        return Err(DrydockError::Conflict(format!(
            "snapshot {} of {} already exists with different contents; bump the version in {}",
            version,
            manifest.name,
            manifest::MANIFEST_FILENAME
        )));
    }

    manifest::write_version(dir, &next)?;
    let bump = ManifestDiff::default().with_change(Field::Version, Some(version.clone()), next.clone());
    platform.update_app(&manifest.name, &bump)?;
    info!(app = %manifest.name, from = %version, to = %next, "version bumped");

    Ok(Target {
        version: next,
        reused: false,
        bumped_from: Some(version),
    })
}

/// The first `x.y.z-N` after `version` that no existing snapshot uses.
/// `1.0.0` becomes `1.0.0-1`, `1.0.0-3` becomes `1.0.0-4`.
pub fn next_prerelease(version: &str, existing: &[Snapshot]) -> crate::error::Result<String> {
    let parsed = Version::parse(version).map_err(|e| {
        DrydockError::Manifest(format!("cannot bump version `{}`: {}", version, e))
    })?;

    let mut n: u64 = if parsed.pre.is_empty() {
        1
    } else {
        match parsed.pre.as_str().parse::<u64>() {
            Ok(current) => current + 1,
            Err(_) => {
                return Err(DrydockError::Manifest(format!(
                    "cannot bump prerelease `{}` of {}",
                    parsed.pre, version
                )))
            }
        }
    };

    loop {
        let mut candidate = parsed.clone();
        candidate.pre = Prerelease::new(&n.to_string())
            .map_err(|e| DrydockError::Manifest(e.to_string()))?;
        candidate.build = semver::BuildMetadata::EMPTY;
        let id = candidate.to_string();
        if !existing.iter().any(|s| s.id == id) {
            return Ok(id);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppState, Checksum};
    use crate::prompt::{Answer, ScriptedPrompter};
    use crate::remote::memory::fixtures::record;
    use crate::remote::memory::{Call, Failure, InMemoryPlatform, Operation};
    use chrono::Utc;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn workdir(manifest: &str) -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), manifest).unwrap();
        fs::write(dir.path().join("server.js"), "require('http').createServer()").unwrap();
        dir
    }

    fn app1_dir() -> TempDir {
        workdir(
            r#"{"name":"app1","version":"1.0.1","subdomain":"app1","scripts":{"start":"node server.js"}}"#,
        )
    }

    fn deployed(outcome: Deployment) -> DeploymentReport {
        match outcome {
            Deployment::Deployed(report) => report,
            other => panic!("expected a deployment, got {:?}", other),
        }
    }

    fn snapshot(id: &str) -> Snapshot {
        Snapshot {
            id: id.into(),
            ctime: Utc::now(),
            checksum: Checksum::sha256("x"),
            app: "app1".into(),
        }
    }

    #[test]
    fn new_app_end_to_end_call_trace() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new();
        let mut prompter = ScriptedPrompter::silent();

        let report = deployed(run(&mut platform, &mut prompter, dir.path()).unwrap());

        assert_eq!(
            platform.calls(),
            &[
                Call::CreateApp("app1".into()),
                Call::CreateSnapshot {
                    app: "app1".into(),
                    version: "1.0.1".into()
                },
                Call::ActivateSnapshot {
                    app: "app1".into(),
                    version: "1.0.1".into()
                },
                Call::StopApp("app1".into()),
                Call::StartApp("app1".into()),
            ]
        );
        assert!(report.created);
        assert_eq!(report.snapshot, "1.0.1");
        assert_eq!(report.transition, Transition::Confirmed(AppState::Started));
        assert_eq!(platform.app("app1").unwrap().state, AppState::Started);
        assert!(prompter.prompts.is_empty());
    }

    #[test]
    fn new_app_is_created_exactly_once_and_never_updated() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new();
        run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap();

        assert_eq!(platform.count_calls(|c| matches!(c, Call::CreateApp(_))), 1);
        assert_eq!(platform.count_calls(|c| matches!(c, Call::UpdateApp(..))), 0);
        let stored = platform.app("app1").unwrap();
        assert_eq!(stored.subdomain.as_deref(), Some("app1"));
        assert_eq!(stored.scripts.start.as_deref(), Some("node server.js"));
    }

    #[test]
    fn identical_manifest_sends_no_update() {
        let dir = app1_dir();
        let mut platform =
            InMemoryPlatform::new().with_app(record("app1", "1.0.1", AppState::Started));
        let report = deployed(run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap());

        assert_eq!(platform.count_calls(|c| matches!(c, Call::UpdateApp(..))), 0);
        assert!(!report.created);
        assert_eq!(report.diff, None);
    }

    #[test]
    fn changed_fields_go_in_a_single_update() {
        let dir = workdir(
            r#"{"name":"app1","version":"1.0.1","subdomain":"shiny","scripts":{"start":"node server.js"}}"#,
        );
        let mut platform =
            InMemoryPlatform::new().with_app(record("app1", "1.0.0", AppState::Started));
        run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap();

        let updates: Vec<&ManifestDiff> = platform
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::UpdateApp(_, d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 1);
        let fields: Vec<Field> = updates[0].iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, vec![Field::Subdomain, Field::Version]);
    }

    #[test]
    fn repeat_deploy_with_identical_content_reuses_snapshot() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new();
        run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap();

        let report = deployed(run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap());
        assert!(report.snapshot_reused);
        assert_eq!(
            platform.count_calls(|c| matches!(c, Call::CreateSnapshot { .. })),
            1
        );
        assert_eq!(
            platform.count_calls(|c| matches!(c, Call::ActivateSnapshot { .. })),
            2
        );
    }

    #[test]
    fn repeat_deploy_with_changed_content_and_declined_bump_conflicts() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new();
        run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap();

        fs::write(dir.path().join("server.js"), "changed").unwrap();
        let mut prompter = ScriptedPrompter::new([Answer::Confirm(false)]);
        let failure = run(&mut platform, &mut prompter, dir.path()).unwrap_err();

        assert_eq!(failure.step, Step::Package);
        assert!(matches!(failure.source, DrydockError::Conflict(_)));
        assert_eq!(
            failure.session.completed,
            vec![Step::LoadManifest, Step::Reconcile]
        );
        assert_eq!(
            platform.count_calls(|c| matches!(c, Call::CreateSnapshot { .. })),
            1
        );
    }

    #[test]
    fn repeat_deploy_with_changed_content_and_accepted_bump() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new();
        run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap();

        fs::write(dir.path().join("server.js"), "changed").unwrap();
        let mut prompter = ScriptedPrompter::new([Answer::Confirm(true)]);
        let report = deployed(run(&mut platform, &mut prompter, dir.path()).unwrap());

        assert_eq!(report.snapshot, "1.0.1-1");
        assert_eq!(report.bumped_from.as_deref(), Some("1.0.1"));
        assert_eq!(manifest::read(dir.path()).unwrap().version, "1.0.1-1");
        assert_eq!(
            platform.app("app1").unwrap().version.as_deref(),
            Some("1.0.1-1")
        );
        assert_eq!(
            platform.app("app1").unwrap().active_snapshot.as_deref(),
            Some("1.0.1-1")
        );
    }

    #[test]
    fn redeploy_after_bump_reuses_snapshot() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new();
        run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap();

        fs::write(dir.path().join("server.js"), "changed").unwrap();
        let mut prompter = ScriptedPrompter::new([Answer::Confirm(true)]);
        let bumped = deployed(run(&mut platform, &mut prompter, dir.path()).unwrap());
        assert_eq!(bumped.snapshot, "1.0.1-1");

        // The uploaded archive already carried version 1.0.1-1, so nothing differs.
        let mut prompter = ScriptedPrompter::silent();
        let report = deployed(run(&mut platform, &mut prompter, dir.path()).unwrap());
        assert!(report.snapshot_reused);
        assert_eq!(report.snapshot, "1.0.1-1");
        assert!(prompter.prompts.is_empty());
        assert_eq!(
            platform.count_calls(|c| matches!(c, Call::CreateSnapshot { .. })),
            2
        );
    }

    #[test]
    fn md5_reporting_platform_reuses_identical_snapshot() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new().reporting_md5();
        run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap();

        let mut prompter = ScriptedPrompter::silent();
        let report = deployed(run(&mut platform, &mut prompter, dir.path()).unwrap());
        assert!(report.snapshot_reused);
        assert!(prompter.prompts.is_empty());
    }

    #[test]
    fn md5_reporting_platform_detects_changed_content() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new().reporting_md5();
        run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap();

        fs::write(dir.path().join("server.js"), "changed").unwrap();
        let mut prompter = ScriptedPrompter::new([Answer::Confirm(false)]);
        let failure = run(&mut platform, &mut prompter, dir.path()).unwrap_err();
        assert_eq!(failure.step, Step::Package);
        assert_eq!(prompter.prompts.len(), 1);
    }

    #[test]
    fn new_app_without_subdomain_asks_for_one() {
        let dir = workdir(r#"{"name":"app1","version":"1.0.1"}"#);
        let mut platform = InMemoryPlatform::new();
        let mut prompter = ScriptedPrompter::new([Answer::Input("shiny".into())]);

        let report = deployed(run(&mut platform, &mut prompter, dir.path()).unwrap());
        assert!(report.created);
        assert_eq!(prompter.prompts, vec!["Subdomain for app1"]);
        assert_eq!(
            platform.app("app1").unwrap().subdomain.as_deref(),
            Some("shiny")
        );
    }

    #[test]
    fn cancelled_subdomain_prompt_stops_before_create() {
        let dir = workdir(r#"{"name":"app1","version":"1.0.1"}"#);
        let mut platform = InMemoryPlatform::new();
        let mut prompter = ScriptedPrompter::new([Answer::Cancel]);

        match run(&mut platform, &mut prompter, dir.path()).unwrap() {
            Deployment::Cancelled { step, completed } => {
                assert_eq!(step, Step::Reconcile);
                assert_eq!(completed, vec![Step::LoadManifest]);
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert_eq!(platform.count_calls(|c| matches!(c, Call::CreateApp(_))), 0);
    }

    #[test]
    fn existing_app_without_declared_subdomain_is_not_asked() {
        let dir = workdir(r#"{"name":"app1","version":"1.0.1"}"#);
        let mut platform =
            InMemoryPlatform::new().with_app(record("app1", "1.0.1", AppState::Started));
        let mut prompter = ScriptedPrompter::silent();
        run(&mut platform, &mut prompter, dir.path()).unwrap();
        assert!(prompter.prompts.is_empty());
        assert_eq!(platform.count_calls(|c| matches!(c, Call::UpdateApp(..))), 0);
    }

    #[test]
    fn stop_failure_is_reported_at_restart_after_activation() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new()
            .with_app(record("app1", "1.0.1", AppState::Started))
            .fail_on(Operation::StopApp, Failure::Unavailable);

        let failure = run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap_err();

        assert_eq!(failure.step, Step::Restart);
        assert!(matches!(failure.source, DrydockError::Unavailable(_)));
        assert!(failure.session.has_completed(Step::Activate));
        assert_eq!(failure.session.snapshot.as_deref(), Some("1.0.1"));
        assert_eq!(platform.count_calls(|c| matches!(c, Call::StartApp(_))), 0);
        assert_eq!(
            platform.app("app1").unwrap().active_snapshot.as_deref(),
            Some("1.0.1")
        );
        assert!(failure.to_string().contains("restart"));
    }

    #[test]
    fn missing_manifest_fails_before_any_remote_call() {
        let dir = tempdir().unwrap();
        let mut platform = InMemoryPlatform::new();
        let failure = run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap_err();

        assert_eq!(failure.step, Step::LoadManifest);
        assert!(matches!(failure.source, DrydockError::Manifest(_)));
        assert!(failure.session.completed.is_empty());
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn unauthorized_lookup_fails_reconcile_without_creating() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new().fail_on(Operation::GetApp, Failure::Unauthorized);
        let failure = run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap_err();

        assert_eq!(failure.step, Step::Reconcile);
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn cancelled_prompt_is_a_clean_stop() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new();
        run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap();

        fs::write(dir.path().join("server.js"), "changed").unwrap();
        let mut prompter = ScriptedPrompter::new([Answer::Cancel]);
        match run(&mut platform, &mut prompter, dir.path()).unwrap() {
            Deployment::Cancelled { step, completed } => {
                assert_eq!(step, Step::Package);
                assert_eq!(completed, vec![Step::LoadManifest, Step::Reconcile]);
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[test]
    fn unsettled_restart_reports_uncertain_state() {
        let dir = app1_dir();
        let mut platform = InMemoryPlatform::new().unsettled();
        let report = deployed(run(&mut platform, &mut ScriptedPrompter::silent(), dir.path()).unwrap());
        assert_eq!(
            report.transition,
            Transition::Uncertain {
                observed: AppState::Other("starting".into())
            }
        );
    }

    #[test]
    fn next_prerelease_skips_taken_ids() {
        assert_eq!(next_prerelease("1.0.0", &[]).unwrap(), "1.0.0-1");
        assert_eq!(next_prerelease("1.0.0-3", &[]).unwrap(), "1.0.0-4");
        let taken = [snapshot("1.0.0-1"), snapshot("1.0.0-2")];
        assert_eq!(next_prerelease("1.0.0", &taken).unwrap(), "1.0.0-3");
        assert!(next_prerelease("latest", &[]).is_err());
    }
}

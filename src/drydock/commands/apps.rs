use crate::commands::helpers::ensure_subdomain;
use crate::commands::lifecycle::{Lifecycle, Transition};
use crate::commands::{CmdMessage, CmdResult};
use crate::diff;
use crate::error::{DrydockError, Result};
use crate::manifest;
use crate::model::AppRecord;
use crate::prompt::Prompter;
use crate::remote::Platform;
use std::path::Path;
use tracing::info;

/// Create the app described by the manifest in `dir`, in the `stopped` state.
/// A manifest without a subdomain is completed interactively first.
pub fn create<P: Platform, R: Prompter>(
    platform: &mut P,
    prompter: &mut R,
    dir: &Path,
) -> Result<CmdResult> {
    let mut manifest = manifest::read(dir)?;
    let mut result = CmdResult::default();

    match ensure_subdomain(prompter, &mut manifest) {
        Ok(()) => {}
        Err(DrydockError::Cancelled) => {
            result.add_message(CmdMessage::info("Operation cancelled."));
            return Ok(result);
        }
        Err(e) => return Err(e),
    }

    match platform.create_app(&AppRecord::from_manifest(&manifest)) {
        Ok(app) => {
            info!(app = %app.name, "app created");
            result.add_message(CmdMessage::success(format!("Created app {}", app.name)));
            Ok(result.with_affected_apps(vec![app]))
        }
        Err(DrydockError::Conflict(_)) => {
            result.add_message(CmdMessage::warning(format!(
                "App {} already exists. Use `drydock apps update` to change it.",
                manifest.name
            )));
            Ok(result)
        }
        Err(e) => Err(e),
    }
}

pub fn list<P: Platform>(platform: &P) -> Result<CmdResult> {
    let apps = platform.list_apps()?;
    let mut result = CmdResult::default();
    if apps.is_empty() {
        result.add_message(CmdMessage::info("No apps found."));
    }
    Ok(result.with_listed_apps(apps))
}

pub fn view<P: Platform>(platform: &P, name: &str) -> Result<CmdResult> {
    let app = platform.get_app(name)?;
    Ok(CmdResult::default().with_affected_apps(vec![app]))
}

/// Push manifest changes to `name` without deploying code.
pub fn update<P: Platform>(platform: &mut P, dir: &Path, name: &str) -> Result<CmdResult> {
    let manifest = manifest::read(dir)?;
    let remote = platform.get_app(name)?;
    let changes = diff::diff(&remote, &manifest);

    let mut result = CmdResult::default();
    if changes.is_empty() {
        result.add_message(CmdMessage::info(format!("No changes to {}.", name)));
        return Ok(result);
    }

    platform.update_app(name, &changes)?;
    info!(app = name, fields = changes.len(), "app updated");
    for (field, change) in changes.iter() {
        result.add_message(CmdMessage::info(format!(
            "  {}: {} -> {}",
            field,
            change.old.as_deref().unwrap_or("(none)"),
            change.new
        )));
    }
    result.add_message(CmdMessage::success(format!("Updated app {}", name)));
    Ok(result)
}

pub fn destroy<P: Platform, R: Prompter>(
    platform: &mut P,
    prompter: &mut R,
    name: &str,
    skip_confirm: bool,
) -> Result<CmdResult> {
    let app = platform.get_app(name)?;

    if !skip_confirm {
        let prompt = format!(
            "Permanently destroy {} and its {} snapshot(s)?",
            name,
            app.snapshots.len()
        );
        if !prompter.confirm(&prompt)? {
            let mut res = CmdResult::default();
            res.add_message(CmdMessage::info("Operation cancelled."));
            return Ok(res);
        }
    }

    platform.destroy_app(name)?;
    info!(app = name, "app destroyed");
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("Destroyed app {}", name)));
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl LifecycleAction {
    fn past_tense(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "started",
            LifecycleAction::Stop => "stopped",
            LifecycleAction::Restart => "restarted",
        }
    }
}

/// Run a lifecycle action, seeding the controller from a fresh read.
pub fn lifecycle<P: Platform>(platform: &mut P, name: &str, action: LifecycleAction) -> Result<CmdResult> {
    let record = platform.get_app(name)?;
    let mut controller = match action {
        LifecycleAction::Restart => Lifecycle::new(name),
        _ => Lifecycle::from_record(&record),
    };

    let transition = match action {
        LifecycleAction::Start => controller.start(platform)?,
        LifecycleAction::Stop => controller.stop(platform)?,
        LifecycleAction::Restart => controller.restart(platform)?,
    };

    let mut result = CmdResult::default();
    match &transition {
        Transition::Confirmed(state) => result.add_message(CmdMessage::success(format!(
            "App {} {} ({})",
            name,
            action.past_tense(),
            state
        ))),
        Transition::Uncertain { observed } => result.add_message(CmdMessage::warning(format!(
            "App {} was not confirmed {}: last observed state is {}. It may still converge.",
            name,
            action.past_tense(),
            observed
        ))),
    }
    Ok(result.with_transition(transition))
}

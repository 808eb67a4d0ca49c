//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer. It is the single
//! entry point for every drydock operation, whatever the UI.
//!
//! ## Role and Responsibilities
//!
//! The API facade:
//! - **Dispatches** to the appropriate command function
//! - **Normalizes inputs** (an omitted app name becomes the manifest's name)
//! - **Returns structured types** (`Result<CmdResult>`, [`Deployment`])
//!
//! It does no printing and holds no business logic.
//!
//! ## Generic Over Platform and Prompter
//!
//! `DrydockApi<P: Platform, R: Prompter>`:
//! - Production: `DrydockApi<HttpPlatform, TerminalPrompter>`
//! - Testing: `DrydockApi<InMemoryPlatform, ScriptedPrompter>`

use crate::commands::apps::LifecycleAction;
use crate::commands::deploy::{DeployFailure, Deployment};
use crate::commands::logs::DEFAULT_LINES;
use crate::commands::{self, helpers};
use crate::error::Result;
use crate::prompt::Prompter;
use crate::remote::Platform;
use std::path::PathBuf;

pub struct DrydockApi<P: Platform, R: Prompter> {
    platform: P,
    prompter: R,
    cwd: PathBuf,
}

impl<P: Platform, R: Prompter> DrydockApi<P, R> {
    pub fn new(platform: P, prompter: R, cwd: PathBuf) -> Self {
        Self {
            platform,
            prompter,
            cwd,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn prompter(&self) -> &R {
        &self.prompter
    }

    fn app_name(&self, explicit: Option<String>) -> Result<String> {
        helpers::app_name(explicit, &self.cwd)
    }

    pub fn deploy(&mut self) -> std::result::Result<Deployment, DeployFailure> {
        commands::deploy::run(&mut self.platform, &mut self.prompter, &self.cwd)
    }

    pub fn create_app(&mut self) -> Result<commands::CmdResult> {
        commands::apps::create(&mut self.platform, &mut self.prompter, &self.cwd)
    }

    pub fn list_apps(&self) -> Result<commands::CmdResult> {
        commands::apps::list(&self.platform)
    }

    pub fn view_app(&self, name: Option<String>) -> Result<commands::CmdResult> {
        let name = self.app_name(name)?;
        commands::apps::view(&self.platform, &name)
    }

    pub fn update_app(&mut self, name: Option<String>) -> Result<commands::CmdResult> {
        let name = self.app_name(name)?;
        commands::apps::update(&mut self.platform, &self.cwd, &name)
    }

    pub fn destroy_app(
        &mut self,
        name: Option<String>,
        skip_confirm: bool,
    ) -> Result<commands::CmdResult> {
        let name = self.app_name(name)?;
        commands::apps::destroy(&mut self.platform, &mut self.prompter, &name, skip_confirm)
    }

    pub fn start_app(&mut self, name: Option<String>) -> Result<commands::CmdResult> {
        self.lifecycle(name, LifecycleAction::Start)
    }

    pub fn stop_app(&mut self, name: Option<String>) -> Result<commands::CmdResult> {
        self.lifecycle(name, LifecycleAction::Stop)
    }

    pub fn restart_app(&mut self, name: Option<String>) -> Result<commands::CmdResult> {
        self.lifecycle(name, LifecycleAction::Restart)
    }

    fn lifecycle(
        &mut self,
        name: Option<String>,
        action: LifecycleAction,
    ) -> Result<commands::CmdResult> {
        let name = self.app_name(name)?;
        commands::apps::lifecycle(&mut self.platform, &name, action)
    }

    pub fn app_logs(
        &self,
        name: Option<String>,
        lines: Option<usize>,
    ) -> Result<commands::CmdResult> {
        let name = self.app_name(name)?;
        commands::logs::app(&self.platform, &name, lines.unwrap_or(DEFAULT_LINES))
    }

    pub fn all_logs(&self, lines: Option<usize>) -> Result<commands::CmdResult> {
        commands::logs::all(&self.platform, lines.unwrap_or(DEFAULT_LINES))
    }

    pub fn list_snapshots(&self, app: Option<String>) -> Result<commands::CmdResult> {
        let app = self.app_name(app)?;
        commands::snapshots::list(&self.platform, &app)
    }

    pub fn create_snapshot(&mut self, version: Option<String>) -> Result<commands::CmdResult> {
        commands::snapshots::create(&mut self.platform, &self.cwd, version)
    }

    pub fn activate_snapshot(
        &mut self,
        app: Option<String>,
        id: Option<String>,
    ) -> Result<commands::CmdResult> {
        let app = self.app_name(app)?;
        commands::snapshots::activate(&mut self.platform, &mut self.prompter, &app, id.as_deref())
    }

    pub fn destroy_snapshot(
        &mut self,
        app: Option<String>,
        id: Option<String>,
        skip_confirm: bool,
    ) -> Result<commands::CmdResult> {
        let app = self.app_name(app)?;
        commands::snapshots::destroy(
            &mut self.platform,
            &mut self.prompter,
            &app,
            id.as_deref(),
            skip_confirm,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AppState;
    use crate::prompt::{Answer, ScriptedPrompter};
    use crate::remote::memory::fixtures::record;
    use crate::remote::memory::{Call, InMemoryPlatform};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn project(name: &str, version: &str) -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            format!(
                r#"{{"name":"{0}","version":"{1}","subdomain":"{0}"}}"#,
                name, version
            ),
        )
        .unwrap();
        dir
    }

    fn api(
        platform: InMemoryPlatform,
        answers: Vec<Answer>,
        dir: &TempDir,
    ) -> DrydockApi<InMemoryPlatform, ScriptedPrompter> {
        DrydockApi::new(
            platform,
            ScriptedPrompter::new(answers),
            dir.path().to_path_buf(),
        )
    }

    #[test]
    fn app_name_defaults_to_manifest() {
        let dir = project("app1", "1.0.0");
        let platform = InMemoryPlatform::new().with_app(record("app1", "1.0.0", AppState::Stopped));
        let mut api = api(platform, vec![], &dir);

        api.start_app(None).unwrap();
        assert_eq!(api.platform().calls(), &[Call::StartApp("app1".into())]);
    }

    #[test]
    fn explicit_app_name_is_used() {
        let dir = project("app1", "1.0.0");
        let platform = InMemoryPlatform::new().with_app(record("other", "1.0.0", AppState::Started));
        let mut api = api(platform, vec![], &dir);

        api.stop_app(Some("other".into())).unwrap();
        assert_eq!(api.platform().calls(), &[Call::StopApp("other".into())]);
    }

    #[test]
    fn deploy_goes_through_the_pipeline() {
        let dir = project("app1", "1.0.0");
        let mut api = api(InMemoryPlatform::new(), vec![], &dir);

        assert!(matches!(api.deploy().unwrap(), Deployment::Deployed(_)));
        assert_eq!(api.platform().app("app1").unwrap().state, AppState::Started);
    }

    #[test]
    fn app_logs_default_to_manifest_app_and_ten_lines() {
        let dir = project("app1", "1.0.0");
        let entries: Vec<(String, String)> = (0..15)
            .map(|i| (format!("t{}", i), format!("desc=line {}", i)))
            .collect();
        let borrowed: Vec<(&str, &str)> = entries
            .iter()
            .map(|(t, x)| (t.as_str(), x.as_str()))
            .collect();
        let platform = InMemoryPlatform::new()
            .with_app(record("app1", "1.0.0", AppState::Started))
            .with_logs("app1", &borrowed);
        let api = api(platform, vec![], &dir);

        let res = api.app_logs(None, None).unwrap();
        assert_eq!(res.log_lines.len(), DEFAULT_LINES);
        assert_eq!(res.log_lines[0].text, "line 5");

        let res = api.app_logs(Some("app1".into()), Some(3)).unwrap();
        assert_eq!(res.log_lines.len(), 3);
    }

    #[test]
    fn create_app_prompts_through_the_facade() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name":"app1","version":"1.0.0"}"#,
        )
        .unwrap();
        let mut api = api(InMemoryPlatform::new(), vec![Answer::Input(String::new())], &dir);

        api.create_app().unwrap();
        assert_eq!(
            api.platform().app("app1").unwrap().subdomain.as_deref(),
            Some("app1")
        );
    }

    #[test]
    fn destroy_snapshot_passes_prompter() {
        let dir = project("app1", "1.0.0");
        let platform = InMemoryPlatform::new()
            .with_app(record("app1", "1.0.0", AppState::Stopped))
            .with_snapshot("app1", "1.0.0", b"a");
        let mut api = api(platform, vec![Answer::Confirm(true)], &dir);

        api.destroy_snapshot(None, None, false).unwrap();
        assert_eq!(api.prompter().prompts.len(), 1);
        assert!(api.list_snapshots(None).unwrap().listed_snapshots.is_empty());
    }
}

use crate::error::Result;
use crate::manifest;
use crate::model::Manifest;
use crate::prompt::Prompter;
use std::path::Path;

/// The app a command targets: the explicit name if given, otherwise the
/// `name` from the manifest in `dir`.
pub fn app_name(explicit: Option<String>, dir: &Path) -> Result<String> {
    match explicit.filter(|n| !n.trim().is_empty()) {
        Some(name) => Ok(name),
        None => Ok(manifest::read(dir)?.name),
    }
}

/// Ask for a subdomain when the manifest declares none, suggesting the app
/// name. A blank answer takes the suggestion.
pub fn ensure_subdomain<R: Prompter>(prompter: &mut R, manifest: &mut Manifest) -> Result<()> {
    if manifest.subdomain.is_some() {
        return Ok(());
    }
    let prompt = format!("Subdomain for {}", manifest.name);
    let answer = prompter.input(&prompt, &manifest.name)?;
    let answer = answer.trim();
    manifest.subdomain = Some(if answer.is_empty() {
        manifest.name.clone()
    } else {
        answer.to_string()
    });
    Ok(())
}

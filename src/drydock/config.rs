use crate::error::{DrydockError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = ".drydockconf";
const DEFAULT_PROTOCOL: &str = "http";
const DEFAULT_REMOTE_HOST: &str = "api.drydock.dev";

/// Connection settings for the platform, stored in `.drydockconf`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrydockConfig {
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default = "default_remote_host", rename = "remoteHost", alias = "remote_host")]
    pub remote_host: String,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// `user:password` shorthand, split into `username`/`password` on load.
    #[serde(default, skip_serializing)]
    auth: Option<String>,
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

fn default_remote_host() -> String {
    DEFAULT_REMOTE_HOST.to_string()
}

impl Default for DrydockConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            remote_host: default_remote_host(),
            port: None,
            username: None,
            password: None,
            auth: None,
        }
    }
}

impl DrydockConfig {
    /// Load config from an explicit file path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DrydockError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: DrydockConfig = serde_json::from_str(&content)?;
        config.split_auth();
        Ok(config)
    }

    /// Locate and load the config file.
    ///
    /// An explicit path must exist. Otherwise the search walks from `cwd` up to
    /// the filesystem root, then tries `home`. Returns defaults when nothing is
    /// found, together with the path that was used.
    pub fn discover(
        cwd: &Path,
        explicit: Option<&Path>,
        home: Option<&Path>,
    ) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(DrydockError::Config(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        let found = find_upwards(cwd).or_else(|| {
            home.map(|h| h.join(CONFIG_FILENAME))
                .filter(|p| p.is_file())
        });

        match found {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    fn split_auth(&mut self) {
        if let Some(auth) = self.auth.take() {
            if let Some((user, pass)) = auth.split_once(':') {
                self.username = Some(user.to_string());
                self.password = Some(pass.to_string());
            }
        }
    }

    /// Base URI of the platform API, e.g. `http://api.drydock.dev:8080`.
    pub fn remote_uri(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.protocol, self.remote_host, port),
            None => format!("{}://{}", self.protocol, self.remote_host),
        }
    }

    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Ok((user, pass)),
            _ => Err(DrydockError::Config(format!(
                "no credentials configured; add `username` and `password` to {}",
                CONFIG_FILENAME
            ))),
        }
    }
}

fn find_upwards(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .find(|candidate| candidate.is_file())
}

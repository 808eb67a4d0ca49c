//! HTTP client for the platform API.

use super::Platform;
use crate::config::DrydockConfig;
use crate::diff::ManifestDiff;
use crate::error::{DrydockError, Result};
use crate::model::{AppLogs, AppRecord, LogEntry, Snapshot};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct AppEnvelope {
    app: AppRecord,
}

#[derive(Debug, Deserialize)]
struct AppsEnvelope {
    #[serde(default)]
    apps: Vec<AppRecord>,
}

#[derive(Debug, Deserialize)]
struct SnapshotsEnvelope {
    #[serde(default)]
    snapshots: Vec<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct SnapshotEnvelope {
    snapshot: Snapshot,
}

#[derive(Debug, Default, Deserialize)]
struct LogsEnvelope {
    #[serde(default)]
    data: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
struct UserLogsEnvelope {
    #[serde(default)]
    apps: BTreeMap<String, LogsEnvelope>,
}

pub struct HttpPlatform {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpPlatform {
    pub fn new(config: &DrydockConfig) -> Result<Self> {
        let (username, password) = config.credentials()?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("drydock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            base_url: config.remote_uri().trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    fn app_url(&self, app: &str, rest: &[&str]) -> String {
        let mut segments = vec!["apps", self.username.as_str(), app];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(transport)?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "platform response");

        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().unwrap_or_default();
            Err(map_status(status, message))
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send(self.client.get(url))?;
        response.json().map_err(transport)
    }

    fn optional_json<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
        let body = response.text().map_err(transport)?;
        parse_optional(&body)
    }

    fn logs_url(&self, app: Option<&str>) -> String {
        let mut segments = vec!["logs", self.username.as_str()];
        segments.extend(app);
        self.url(&segments)
    }
}

/// Empty bodies yield `None`; anything else must parse.
fn parse_optional<T: DeserializeOwned>(body: &str) -> Result<Option<T>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

impl Platform for HttpPlatform {
    fn get_app(&self, name: &str) -> Result<AppRecord> {
        let mut envelope: AppEnvelope = self.get_json(&self.app_url(name, &[]))?;
        // Confirming reads may return a partial record without the name.
        if envelope.app.name.is_empty() {
            envelope.app.name = name.to_string();
        }
        Ok(envelope.app)
    }

    fn list_apps(&self) -> Result<Vec<AppRecord>> {
        let envelope: AppsEnvelope = self.get_json(&self.url(&["apps", self.username.as_str()]))?;
        Ok(envelope.apps)
    }

    fn create_app(&mut self, record: &AppRecord) -> Result<AppRecord> {
        let url = self.app_url(&record.name, &[]);
        let response = self.send(self.client.post(url).json(record))?;
        let mut created = match Self::optional_json::<AppEnvelope>(response)? {
            Some(envelope) => envelope.app,
            None => return self.get_app(&record.name),
        };
        if created.name.is_empty() {
            created.name = record.name.clone();
        }
        Ok(created)
    }

    fn update_app(&mut self, name: &str, diff: &ManifestDiff) -> Result<()> {
        let url = self.app_url(name, &[]);
        self.send(self.client.put(url).json(&diff.to_update_body()))?;
        Ok(())
    }

    fn destroy_app(&mut self, name: &str) -> Result<()> {
        self.send(self.client.delete(self.app_url(name, &[])))?;
        Ok(())
    }

    fn start_app(&mut self, name: &str) -> Result<()> {
        let url = self.app_url(name, &["start"]);
        self.send(self.client.post(url).json(&serde_json::json!({})))?;
        Ok(())
    }

    fn stop_app(&mut self, name: &str) -> Result<()> {
        let url = self.app_url(name, &["stop"]);
        self.send(self.client.post(url).json(&serde_json::json!({})))?;
        Ok(())
    }

    fn list_snapshots(&self, app: &str) -> Result<Vec<Snapshot>> {
        let envelope: SnapshotsEnvelope = self.get_json(&self.app_url(app, &["snapshots"]))?;
        Ok(envelope.snapshots)
    }

    fn create_snapshot(&mut self, app: &str, version: &str, bytes: &[u8]) -> Result<Snapshot> {
        let url = self.app_url(app, &["snapshots", version]);
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec());
        let response = self.send(request)?;
        if let Some(envelope) = Self::optional_json::<SnapshotEnvelope>(response)? {
            return Ok(envelope.snapshot);
        }

        self.list_snapshots(app)?
            .into_iter()
            .find(|s| s.id == version)
            .ok_or_else(|| {
                DrydockError::NotFound(format!("snapshot {} of {} after upload", version, app))
            })
    }

    fn activate_snapshot(&mut self, app: &str, version: &str) -> Result<()> {
        let url = self.app_url(app, &["snapshots", version, "activate"]);
        self.send(self.client.post(url).json(&serde_json::json!({})))?;
        Ok(())
    }

    fn destroy_snapshot(&mut self, app: &str, version: &str) -> Result<()> {
        let url = self.app_url(app, &["snapshots", version]);
        self.send(self.client.delete(url))?;
        Ok(())
    }

    fn app_logs(&self, app: &str, lines: usize) -> Result<Vec<LogEntry>> {
        let request = self
            .client
            .get(self.logs_url(Some(app)))
            .query(&[("lines", lines)]);
        let envelope: Option<LogsEnvelope> = Self::optional_json(self.send(request)?)?;
        Ok(envelope.unwrap_or_default().data)
    }

    fn user_logs(&self, lines: usize) -> Result<Vec<AppLogs>> {
        let request = self
            .client
            .get(self.logs_url(None))
            .query(&[("lines", lines)]);
        let envelope: Option<UserLogsEnvelope> = Self::optional_json(self.send(request)?)?;
        Ok(envelope
            .map(|e| e.apps)
            .unwrap_or_default()
            .into_iter()
            .map(|(app, logs)| AppLogs {
                app,
                entries: logs.data,
            })
            .collect())
    }
}

fn transport(err: reqwest::Error) -> DrydockError {
    DrydockError::Unavailable(err.to_string())
}

fn map_status(status: StatusCode, message: String) -> DrydockError {
    let message = if message.trim().is_empty() {
        status.to_string()
    } else {
        message
    };

    match status {
        StatusCode::NOT_FOUND => DrydockError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DrydockError::Unauthorized(message),
        StatusCode::CONFLICT => DrydockError::Conflict(message),
        s if s.is_server_error() => DrydockError::Unavailable(message),
        s => DrydockError::Api {
            status: s.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DrydockConfig {
        let mut config = DrydockConfig::default();
        config.remote_host = "api.mock.local".into();
        config.port = Some(8080);
        config.username = Some("tester".into());
        config.password = Some("secret".into());
        config
    }

    #[test]
    fn test_requires_credentials() {
        assert!(HttpPlatform::new(&DrydockConfig::default()).is_err());
    }

    #[test]
    fn test_app_urls() {
        let platform = HttpPlatform::new(&config()).unwrap();
        assert_eq!(
            platform.app_url("app1", &[]),
            "http://api.mock.local:8080/apps/tester/app1"
        );
        assert_eq!(
            platform.app_url("app1", &["snapshots", "1.0.1", "activate"]),
            "http://api.mock.local:8080/apps/tester/app1/snapshots/1.0.1/activate"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, String::new()),
            DrydockError::NotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, "nope".into()),
            DrydockError::Unauthorized(_)
        ));
        assert!(matches!(
            map_status(StatusCode::CONFLICT, "exists".into()),
            DrydockError::Conflict(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, String::new()),
            DrydockError::Unavailable(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, "bad".into()),
            DrydockError::Api { status: 400, .. }
        ));
    }

    #[test]
    fn test_logs_urls() {
        let platform = HttpPlatform::new(&config()).unwrap();
        assert_eq!(
            platform.logs_url(Some("app1")),
            "http://api.mock.local:8080/logs/tester/app1"
        );
        assert_eq!(platform.logs_url(None), "http://api.mock.local:8080/logs/tester");
    }

    #[test]
    fn test_empty_body_is_none() {
        assert!(parse_optional::<AppEnvelope>("").unwrap().is_none());
        assert!(parse_optional::<SnapshotEnvelope>("  \n").unwrap().is_none());
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        let err = parse_optional::<SnapshotEnvelope>("<html>502</html>").unwrap_err();
        assert!(matches!(err, DrydockError::Serialization(_)));

        // Valid JSON with the wrong shape is just as malformed.
        let err = parse_optional::<SnapshotEnvelope>(r#"{"snapshot":{"id":"1.0.0"}}"#)
            .unwrap_err();
        assert!(matches!(err, DrydockError::Serialization(_)));
    }

    #[test]
    fn test_snapshot_envelope_parses() {
        let body = r#"{"snapshot":{"id":"1.0.0","ctime":"2024-01-02T03:04:05Z","md5":"abc"}}"#;
        let envelope = parse_optional::<SnapshotEnvelope>(body).unwrap().unwrap();
        assert_eq!(envelope.snapshot.checksum, crate::model::Checksum::md5("abc"));
    }

    #[test]
    fn test_user_logs_envelope_parses() {
        let body = r#"{"apps":{"app1":{"data":[{"timestamp":"t1","text":"hello"}]},"app2":{}}}"#;
        let envelope = parse_optional::<UserLogsEnvelope>(body).unwrap().unwrap();
        assert_eq!(envelope.apps["app1"].data[0].text, "hello");
        assert!(envelope.apps["app2"].data.is_empty());
    }

    #[test]
    fn test_partial_app_envelope_parses() {
        let envelope: AppEnvelope =
            serde_json::from_str(r#"{"app":{"state":"started"}}"#).unwrap();
        assert_eq!(envelope.app.state, crate::model::AppState::Started);
    }
}

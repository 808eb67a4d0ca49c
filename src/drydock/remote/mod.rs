//! # Remote Resource Client
//!
//! The [`Platform`] trait is the surface the rest of drydock consumes from the
//! hosting platform. Business logic never talks HTTP directly.
//!
//! ## Implementations
//!
//! - [`http::HttpPlatform`]: production client over the platform's JSON API
//!   - Blocking `reqwest` client, basic auth from [`DrydockConfig`](crate::config::DrydockConfig)
//!   - Maps HTTP status codes onto [`DrydockError`](crate::error::DrydockError)
//!
//! - [`memory::InMemoryPlatform`]: in-process platform for testing
//!   - Records every mutating call in order
//!   - Supports failure injection and "slow" lifecycle transitions
//!
//! ## Error contract
//!
//! Every call may fail with `NotFound`, `Unauthorized`, `Conflict` or
//! `Unavailable`. Callers treat `NotFound` as a control-flow signal where they
//! are checking for existence and everything else as fatal to the current step.
//! Nothing here retries: mutating calls are not idempotent.

use crate::diff::ManifestDiff;
use crate::error::Result;
use crate::model::{AppLogs, AppRecord, LogEntry, Snapshot};

pub mod http;
pub mod memory;

pub trait Platform {
    /// Fetch an application record. `NotFound` if it does not exist.
    fn get_app(&self, name: &str) -> Result<AppRecord>;

    /// All applications owned by the authenticated account.
    fn list_apps(&self) -> Result<Vec<AppRecord>>;

    /// Create an application. `Conflict` if the name is taken.
    fn create_app(&mut self, record: &AppRecord) -> Result<AppRecord>;

    /// Apply the changed fields in `diff` to the named application.
    fn update_app(&mut self, name: &str, diff: &ManifestDiff) -> Result<()>;

    fn destroy_app(&mut self, name: &str) -> Result<()>;

    fn start_app(&mut self, name: &str) -> Result<()>;

    fn stop_app(&mut self, name: &str) -> Result<()>;

    /// Snapshots of `app`, most recent first.
    fn list_snapshots(&self, app: &str) -> Result<Vec<Snapshot>>;

    /// Upload `bytes` as snapshot `version`. `Conflict` if the version exists.
    fn create_snapshot(&mut self, app: &str, version: &str, bytes: &[u8]) -> Result<Snapshot>;

    fn activate_snapshot(&mut self, app: &str, version: &str) -> Result<()>;

    fn destroy_snapshot(&mut self, app: &str, version: &str) -> Result<()>;

    /// The last `lines` log entries of `app`, oldest first.
    fn app_logs(&self, app: &str, lines: usize) -> Result<Vec<LogEntry>>;

    /// The last `lines` log entries of every application of the account.
    fn user_logs(&self, lines: usize) -> Result<Vec<AppLogs>>;
}

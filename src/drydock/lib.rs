//! # Drydock Architecture
//!
//! Drydock deploys and manages applications on a hosting platform. It is a
//! library with a CLI client on top, not a CLI with some helpers underneath.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, formats output, handles terminal I/O   │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade over commands                                │
//! │  - Resolves omitted app names from the manifest             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Deployment pipeline, lifecycle, snapshot selection       │
//! │  - Talks to the platform and the user only through traits   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Remote Layer (remote/) and Prompter (prompt.rs)            │
//! │  - Platform trait: HttpPlatform, InMemoryPlatform           │
//! │  - Prompter trait: TerminalPrompter, ScriptedPrompter       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No Transactions
//!
//! The platform API offers no multi-resource transactions, idempotency tokens or
//! rollback. A deployment is a fixed sequence of mutating calls; when one fails
//! the earlier ones stay applied and the caller is told which step failed and
//! which steps completed. See [`commands::deploy`].
//!
//! ## Testing Strategy
//!
//! 1. **Commands**: unit tests against `InMemoryPlatform` and `ScriptedPrompter`,
//!    which record every mutating call and every prompt.
//! 2. **API**: dispatch and name resolution.
//! 3. **CLI**: binary tests in `tests/` that never reach the network.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade
//! - [`commands`]: Deploy, apps, snapshots, logs and lifecycle logic
//! - [`remote`]: Platform abstraction and implementations
//! - [`prompt`]: Interactive choose/confirm
//! - [`manifest`]: `package.json` loading
//! - [`diff`]: Local vs. remote manifest comparison
//! - [`package`]: Snapshot archives and checksums
//! - [`model`]: Apps, snapshots, manifests, log entries
//! - [`config`]: `.drydockconf` discovery
//! - [`error`]: Error types

pub mod api;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod manifest;
pub mod model;
pub mod package;
pub mod prompt;
pub mod remote;

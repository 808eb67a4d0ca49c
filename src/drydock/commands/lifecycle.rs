//! Start/stop/restart with a single confirming read.
//!
//! The platform applies lifecycle requests asynchronously. After each request
//! the controller reads the record once: if it reports the requested state the
//! transition is [`Transition::Confirmed`], otherwise [`Transition::Uncertain`].
//! There is no polling. An uncertain outcome is not an error.

use crate::error::{DrydockError, Result};
use crate::model::{AppRecord, AppState};
use crate::remote::Platform;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Unknown,
    Stopped,
    Started,
}

impl RunState {
    pub fn from_observed(state: &AppState) -> Self {
        match state {
            AppState::Started => RunState::Started,
            AppState::Stopped => RunState::Stopped,
            AppState::Other(_) => RunState::Unknown,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Unknown => write!(f, "unknown"),
            RunState::Stopped => write!(f, "stopped"),
            RunState::Started => write!(f, "started"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Confirmed(AppState),
    /// The confirming read did not report the requested state.
    Uncertain { observed: AppState },
}

impl Transition {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Transition::Confirmed(_))
    }

    pub fn observed(&self) -> &AppState {
        match self {
            Transition::Confirmed(state) => state,
            Transition::Uncertain { observed } => observed,
        }
    }
}

/// The only component that sends raw start/stop requests.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    app: String,
    state: RunState,
}

impl Lifecycle {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            state: RunState::Unknown,
        }
    }

    pub fn from_record(record: &AppRecord) -> Self {
        Self {
            app: record.name.clone(),
            state: RunState::from_observed(&record.state),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn start<P: Platform>(&mut self, platform: &mut P) -> Result<Transition> {
        if self.state == RunState::Started {
            return Err(self.invalid("start"));
        }
        debug!(app = %self.app, "starting");
        platform.start_app(&self.app)?;
        self.confirm(platform, AppState::Started, RunState::Started)
    }

    pub fn stop<P: Platform>(&mut self, platform: &mut P) -> Result<Transition> {
        if self.state == RunState::Stopped {
            return Err(self.invalid("stop"));
        }
        debug!(app = %self.app, "stopping");
        platform.stop_app(&self.app)?;
        self.confirm(platform, AppState::Stopped, RunState::Stopped)
    }

    /// Stop then start. A failed stop means start is never sent; an uncertain
    /// stop still proceeds because the platform handles requests in order.
    pub fn restart<P: Platform>(&mut self, platform: &mut P) -> Result<Transition> {
        if self.state == RunState::Stopped {
            return self.start(platform);
        }
        let stopped = self.stop(platform)?;
        if let Transition::Uncertain { observed } = &stopped {
            warn!(app = %self.app, observed = %observed, "stop not confirmed, starting anyway");
        }
        self.start(platform)
    }

    fn confirm<P: Platform>(
        &mut self,
        platform: &P,
        wanted: AppState,
        settled: RunState,
    ) -> Result<Transition> {
        let observed = platform.get_app(&self.app)?.state;
        if observed == wanted {
            self.state = settled;
            Ok(Transition::Confirmed(observed))
        } else {
            self.state = RunState::Unknown;
            Ok(Transition::Uncertain { observed })
        }
    }

    fn invalid(&self, action: &'static str) -> DrydockError {
        DrydockError::InvalidTransition {
            action,
            app: self.app.clone(),
            state: self.state.to_string(),
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrydockError {
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}. Check your credentials in .drydockconf and try again")]
    Unauthorized(String),

    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Cannot {action} app {app} while it is {state}")]
    InvalidTransition {
        action: &'static str,
        app: String,
        state: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DrydockError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DrydockError::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DrydockError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, DrydockError>;

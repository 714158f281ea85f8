//! Error taxonomy shared by every component that talks to the backend.

use crate::models::{AlertId, AlertStatus};

/// Failures surfaced by the gateway, the alert controller and the feeds.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Transport-level failure: DNS, refused connection, reset, TLS...
    #[error("backend unreachable at {endpoint}: {reason}")]
    NetworkUnreachable { endpoint: String, reason: String },

    /// The backend answered with a non-2xx status. The body is never parsed.
    #[error("request to {endpoint} failed with status {status}")]
    RequestFailed { status: u16, endpoint: String },

    /// The backend refused a state change because the alert is not in a
    /// state that allows it (already acknowledged, already resolved, or a
    /// concurrent operator got there first).
    #[error("alert {alert_id}: {operation} rejected (current: {})", current_label(.current))]
    TransitionRejected {
        alert_id: AlertId,
        operation: String,
        current: Option<AlertStatus>,
    },

    /// A direct-typed endpoint (login, predict, settings) returned a body
    /// that does not match its contract.
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("session storage error: {0}")]
    Storage(#[from] SessionError),
}

fn current_label(current: &Option<AlertStatus>) -> String {
    match current {
        Some(status) => status.to_string(),
        None => "unknown".to_string(),
    }
}

impl ConsoleError {
    /// Status code of a `RequestFailed`, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConsoleError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transition_rejected(&self) -> bool {
        matches!(self, ConsoleError::TransitionRejected { .. })
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, ConsoleError::NetworkUnreachable { .. })
    }
}

/// Errors raised by the durable key-value stores behind the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("no config directory available for the session file")]
    NoConfigDir,
    #[error("keyring accepted '{0}' but did not keep it")]
    NotPersisted(String),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

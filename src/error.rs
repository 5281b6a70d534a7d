use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response from {endpoint}: {source}")]
    MalformedResponse {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("{op} was cancelled")]
    Cancelled { op: &'static str },

    /// The two variable listings for one frame disagree on which variables exist.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("stack level {level} missing while indexing {frames} frames")]
    FrameGap { level: usize, frames: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for failures of the round trip itself rather than of its content.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BridgeError::Http(_)
                | BridgeError::MalformedResponse { .. }
                | BridgeError::Timeout { .. }
                | BridgeError::Cancelled { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

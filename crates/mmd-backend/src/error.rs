use std::time::Duration;

/// Failure of one backend request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Connection refused, reset, DNS failure, ...
    #[error("{0}")]
    Transport(String),

    #[error("Backend request timeout")]
    Timeout(Duration),

    /// Non-2xx status. `detail` is the backend-provided message when the body
    /// carried one, otherwise the canonical reason phrase.
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// Text shown to the operator. Backend-provided detail is preferred
    /// verbatim over the status prefix.
    pub fn reason(&self) -> String {
        match self {
            BackendError::Http { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Network-level failure (no response was produced).
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Transport(_) | BackendError::Timeout(_))
    }
}

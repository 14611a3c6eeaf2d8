use mmd_backend::BackendError;
use mmd_registry::RegistryError;

/// Failure surfaced to the caller of a dashboard operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DashboardError {
    /// Network failure or timeout talking to the backend.
    #[error("{0}")]
    Transport(String),

    /// Backend answered with an error (or with an unusable body).
    #[error("{detail}")]
    Backend { status: Option<u16>, detail: String },

    /// Rejected before any backend call.
    #[error("{0}")]
    Validation(String),

    /// The operation refers to state that no longer exists.
    #[error("{0}")]
    State(String),
}

impl DashboardError {
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::Transport(_) => "transport",
            DashboardError::Backend { .. } => "backend",
            DashboardError::Validation(_) => "validation",
            DashboardError::State(_) => "state",
        }
    }

    pub(crate) fn stopped() -> Self {
        DashboardError::State("dashboard runtime stopped".to_string())
    }
}

impl From<BackendError> for DashboardError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport(_) | BackendError::Timeout(_) => {
                DashboardError::Transport(err.reason())
            }
            BackendError::Http { status, detail } => DashboardError::Backend {
                status: Some(status),
                detail,
            },
            BackendError::Decode(_) => DashboardError::Backend {
                status: None,
                detail: err.reason(),
            },
        }
    }
}

impl From<RegistryError> for DashboardError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::SlotOutOfRange { .. }
            | RegistryError::SlotOccupied { .. }
            | RegistryError::SkillOutOfRange { .. } => DashboardError::Validation(err.to_string()),
            RegistryError::DuplicateTicket { .. } | RegistryError::TicketNotPresent { .. } => {
                DashboardError::State(err.to_string())
            }
        }
    }
}

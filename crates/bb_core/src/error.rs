use thiserror::Error;

/// Local, non-fatal failures returned by every engine operation.
///
/// Callers translate these into user-facing messages; none of them leaves
/// a match half-mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Wrong actor for the operation (not the captain, not the addressee of
    /// a prompt, not the host). Surfaced to the actor only.
    #[error("Rejected: {0}")]
    RejectedAction(String),

    /// Operation attempted outside its legal state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Roster already holds the maximum number of joiners or is locked.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// No match (or request) exists for the given key.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl EngineError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        EngineError::RejectedAction(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        EngineError::InvalidState(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        EngineError::CapacityExceeded(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    /// True when the message should only be shown to the acting player.
    pub fn is_actor_facing(&self) -> bool {
        matches!(self, EngineError::RejectedAction(_))
    }

    /// Stable machine-readable code used by the JSON API.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::RejectedAction(_) => "REJECTED_ACTION",
            EngineError::InvalidState(_) => "INVALID_STATE",
            EngineError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            EngineError::NotFound(_) => "NOT_FOUND",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

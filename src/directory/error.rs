use thiserror::Error;

/// Failure modes of the admin directory service, separated so callers can
/// recover locally where the run should continue (absent accounts,
/// incomplete queue payloads) and surface everything else.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory authentication failed: {reason}")]
    Auth { reason: String },

    #[error("no such account: {address}")]
    NotFound { address: String },

    #[error("directory request failed")]
    Transport(#[from] reqwest::Error),

    #[error("{reason}")]
    QueueData { reason: String },

    #[error("malformed directory response: {reason}")]
    Malformed { reason: String },

    #[error("directory fault {code}: {reason}")]
    Fault { code: String, reason: String },
}

impl DirectoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound { .. })
    }
}

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid layout: {reason}")]
    InvalidLayout { reason: String },
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl SessionError {
    pub(crate) fn invalid_layout(reason: impl Into<String>) -> Self {
        SessionError::InvalidLayout {
            reason: reason.into(),
        }
    }
}

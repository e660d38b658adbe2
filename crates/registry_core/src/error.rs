//! Boundary-facing error classification.
//!
//! Every core error maps to one `ErrorKind`; outer layers pick a status
//! code from the kind and use the error's `Display` text as the message.

use crate::auth::AuthError;
use crate::service::registry_service::ServiceError;

/// Coarse error class shared by every core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// Whether the message may be shown to the caller verbatim.
    pub fn is_client_error(self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Repo(_) | Self::InconsistentState(_) => ErrorKind::Internal,
        }
    }
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized | Self::InvalidCredentials => ErrorKind::Unauthorized,
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::UserExists(_) => ErrorKind::Conflict,
            Self::Hash(_) | Self::Repo(_) => ErrorKind::Internal,
        }
    }
}

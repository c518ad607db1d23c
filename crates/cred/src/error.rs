//! Login failure taxonomy.

use std::path::PathBuf;

use crate::shape::CredentialShape;

/// Errors produced while dispatching, verifying or minting a login.
///
/// Callers branch on the variant, never on the message text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No registered checker accepts any shape the credentials implement.
    #[error("no checker registered for credential shapes: {shapes}")]
    UnhandledCredentials { shapes: String },

    /// A checker recognised the credentials but verification failed, or the
    /// realm could not satisfy any requested interface.
    #[error("unauthorized login: {reason}")]
    UnauthorizedLogin { reason: String },

    /// The identity was verified but refused for policy reasons.
    #[error("login denied: {reason}")]
    LoginDenied { reason: String },

    /// Username lookup failed in a password store.
    #[error("unknown user: {username}")]
    UnknownUser { username: String },

    /// The credentials declare a shape without exposing the matching facet.
    #[error("credentials do not expose the {shape} shape")]
    MalformedCredentials { shape: CredentialShape },

    /// A record in a flat-file password store has too few fields.
    #[error("malformed record at {}:{line}", path.display())]
    MalformedRecord { path: PathBuf, line: usize },

    #[error("at least one interface must be requested")]
    NoInterfacesRequested,

    /// Invalid checker or realm configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::UnauthorizedLogin {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::LoginDenied {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::UnauthorizedLogin { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::LoginDenied { .. })
    }

    pub fn is_unhandled(&self) -> bool {
        matches!(self, Self::UnhandledCredentials { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! The checker contract and the in-memory reference checkers.

use std::{collections::HashMap, fmt};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret, SecretString},
    tracing::debug,
};

use crate::{
    credentials::Credentials,
    error::{Error, Result},
    shape::{ANONYMOUS, CredentialShape, USERNAME_HASHED_PASSWORD, USERNAME_PASSWORD},
};

/// Identity produced by a checker and handed verbatim to the realm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AvatarId {
    /// The caller proved nothing and was let in anyway.
    Anonymous,
    Named(String),
}

impl AvatarId {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// The name, or `None` for anonymous identities.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Named(name) => Some(name),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Display for AvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("<anonymous>"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for AvatarId {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for AvatarId {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// Verifies credentials of the shapes it declares.
///
/// A checker is created once and shared across concurrent logins, so
/// verification must not depend on per-call mutable state.
#[async_trait]
pub trait CredentialsChecker: Send + Sync {
    /// Shapes this checker accepts. Fixed for the checker's lifetime.
    fn credential_shapes(&self) -> &[CredentialShape];

    /// Verify `credentials`, returning the identity they prove.
    ///
    /// Fails with [`Error::UnauthorizedLogin`] when the credentials are
    /// recognised but do not verify.
    async fn request_avatar_id(&self, credentials: &dyn Credentials) -> Result<AvatarId>;
}

// ── In-memory password database ─────────────────────────────────────────────

/// Username/password pairs held in memory, compared exactly.
///
/// Intended for tests and small static deployments.
#[derive(Default)]
pub struct InMemoryPasswordDatabase {
    users: HashMap<String, SecretString>,
}

impl InMemoryPasswordDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    pub fn add_user(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.users
            .insert(username.into(), Secret::new(password.into()));
    }

    /// Builder form of [`add_user`](Self::add_user).
    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.add_user(username, password);
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl fmt::Debug for InMemoryPasswordDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.users.keys().collect();
        names.sort();
        f.debug_struct("InMemoryPasswordDatabase")
            .field("users", &names)
            .finish()
    }
}

#[async_trait]
impl CredentialsChecker for InMemoryPasswordDatabase {
    fn credential_shapes(&self) -> &[CredentialShape] {
        &[USERNAME_PASSWORD, USERNAME_HASHED_PASSWORD]
    }

    async fn request_avatar_id(&self, credentials: &dyn Credentials) -> Result<AvatarId> {
        let creds = credentials
            .as_password()
            .ok_or(Error::MalformedCredentials {
                shape: USERNAME_PASSWORD,
            })?;

        let username = creds.username();
        let Some(stored) = self.users.get(username) else {
            debug!(username, "unknown user in memory database");
            return Err(Error::unauthorized("unknown user"));
        };

        if creds.check_password(stored.expose_secret()) {
            Ok(AvatarId::named(username))
        } else {
            Err(Error::unauthorized("password mismatch"))
        }
    }
}

// ── Anonymous access ────────────────────────────────────────────────────────

/// Lets anonymous credentials in as [`AvatarId::Anonymous`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAnonymousAccess;

#[async_trait]
impl CredentialsChecker for AllowAnonymousAccess {
    fn credential_shapes(&self) -> &[CredentialShape] {
        &[ANONYMOUS]
    }

    async fn request_avatar_id(&self, _credentials: &dyn Credentials) -> Result<AvatarId> {
        Ok(AvatarId::Anonymous)
    }
}

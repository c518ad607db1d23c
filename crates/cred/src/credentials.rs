//! Credential values and the facets checkers read them through.

use std::{fmt, sync::Arc};

use secrecy::{ExposeSecret, Secret, SecretString};

use crate::{
    conversation::Conversation,
    shape::{
        self, ANONYMOUS, CONVERSATION, CredentialShape, USERNAME_HASHED_PASSWORD, USERNAME_PASSWORD,
    },
};

/// A proof of identity.
///
/// Implementors declare the shapes they implement directly; inherited shapes
/// are derived from the shape table. A checker reads the proof through one
/// of the facet accessors, which default to `None`.
pub trait Credentials: Send + Sync + fmt::Debug {
    /// Directly implemented shapes, most specific first.
    fn shapes(&self) -> &[CredentialShape];

    /// Every implemented shape, most derived first.
    fn implemented_shapes(&self) -> Vec<CredentialShape> {
        shape::lineage(self.shapes())
    }

    fn provides(&self, shape: &CredentialShape) -> bool {
        self.implemented_shapes().contains(shape)
    }

    fn as_password(&self) -> Option<&dyn PasswordCredentials> {
        None
    }

    fn as_conversational(&self) -> Option<&dyn Conversational> {
        None
    }
}

/// Username plus something comparable against a stored password field.
pub trait PasswordCredentials: Send + Sync {
    fn username(&self) -> &str;

    /// Compare the carried proof against the stored password field.
    fn check_password(&self, stored: &str) -> bool;

    /// The plaintext password, when the credentials carry one.
    fn plaintext(&self) -> Option<&SecretString> {
        None
    }
}

/// Username plus a callback able to answer prompts.
pub trait Conversational: Send + Sync {
    fn username(&self) -> &str;

    fn conversation(&self) -> &dyn Conversation;
}

// ── Username / password ─────────────────────────────────────────────────────

/// Username with a plaintext password.
pub struct UsernamePassword {
    username: String,
    password: SecretString,
}

impl UsernamePassword {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }
}

impl fmt::Debug for UsernamePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernamePassword")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Credentials for UsernamePassword {
    fn shapes(&self) -> &[CredentialShape] {
        &[USERNAME_PASSWORD]
    }

    fn as_password(&self) -> Option<&dyn PasswordCredentials> {
        Some(self)
    }
}

impl PasswordCredentials for UsernamePassword {
    fn username(&self) -> &str {
        &self.username
    }

    fn check_password(&self, stored: &str) -> bool {
        self.password.expose_secret() == stored
    }

    fn plaintext(&self) -> Option<&SecretString> {
        Some(&self.password)
    }
}

// ── Username / hashed password ──────────────────────────────────────────────

/// Username with a password hashed before it reached the server.
///
/// Only usable against stores that keep the same hash, since the plaintext is
/// never available for comparison.
pub struct UsernameHashedPassword {
    username: String,
    hashed: SecretString,
}

impl UsernameHashedPassword {
    pub fn new(username: impl Into<String>, hashed: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            hashed: Secret::new(hashed.into()),
        }
    }
}

impl fmt::Debug for UsernameHashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernameHashedPassword")
            .field("username", &self.username)
            .field("hashed", &"[REDACTED]")
            .finish()
    }
}

impl Credentials for UsernameHashedPassword {
    fn shapes(&self) -> &[CredentialShape] {
        &[USERNAME_HASHED_PASSWORD]
    }

    fn as_password(&self) -> Option<&dyn PasswordCredentials> {
        Some(self)
    }
}

impl PasswordCredentials for UsernameHashedPassword {
    fn username(&self) -> &str {
        &self.username
    }

    fn check_password(&self, stored: &str) -> bool {
        self.hashed.expose_secret() == stored
    }
}

// ── Conversation ────────────────────────────────────────────────────────────

/// Username with a conversation callback for interactive verifiers.
pub struct ConversationCredentials {
    username: String,
    conversation: Arc<dyn Conversation>,
}

impl ConversationCredentials {
    pub fn new(username: impl Into<String>, conversation: Arc<dyn Conversation>) -> Self {
        Self {
            username: username.into(),
            conversation,
        }
    }
}

impl fmt::Debug for ConversationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Credentials for ConversationCredentials {
    fn shapes(&self) -> &[CredentialShape] {
        &[CONVERSATION]
    }

    fn as_conversational(&self) -> Option<&dyn Conversational> {
        Some(self)
    }
}

impl Conversational for ConversationCredentials {
    fn username(&self) -> &str {
        &self.username
    }

    fn conversation(&self) -> &dyn Conversation {
        self.conversation.as_ref()
    }
}

// ── Anonymous ───────────────────────────────────────────────────────────────

/// Credentials that prove nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl Credentials for Anonymous {
    fn shapes(&self) -> &[CredentialShape] {
        &[ANONYMOUS]
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const DERIVED: CredentialShape = CredentialShape::derived("derived", &[USERNAME_PASSWORD]);

    #[derive(Debug)]
    struct Derived(UsernamePassword);

    impl Credentials for Derived {
        fn shapes(&self) -> &[CredentialShape] {
            &[DERIVED]
        }

        fn as_password(&self) -> Option<&dyn PasswordCredentials> {
            Some(&self.0)
        }
    }

    #[test]
    fn plaintext_compares_exactly() {
        let creds = UsernamePassword::new("alice", "secret");
        let pw = creds.as_password().unwrap();
        assert_eq!(pw.username(), "alice");
        assert!(pw.check_password("secret"));
        assert!(!pw.check_password("Secret"));
        assert!(!pw.check_password("secret "));
        assert_eq!(pw.plaintext().unwrap().expose_secret(), "secret");
    }

    #[test]
    fn hashed_has_no_plaintext() {
        let creds = UsernameHashedPassword::new("alice", "c2VjcmV0");
        let pw = creds.as_password().unwrap();
        assert!(pw.check_password("c2VjcmV0"));
        assert!(!pw.check_password("secret"));
        assert!(pw.plaintext().is_none());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", UsernamePassword::new("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));

        let rendered = format!("{:?}", UsernameHashedPassword::new("alice", "abcdef"));
        assert!(!rendered.contains("abcdef"));
    }

    #[test]
    fn derived_credentials_provide_base_shape() {
        let creds = Derived(UsernamePassword::new("bob", "hello"));
        assert_eq!(creds.implemented_shapes(), vec![DERIVED, USERNAME_PASSWORD]);
        assert!(creds.provides(&USERNAME_PASSWORD));
        assert!(!creds.provides(&USERNAME_HASHED_PASSWORD));
    }

    #[test]
    fn anonymous_has_no_facets() {
        assert!(Anonymous.as_password().is_none());
        assert!(Anonymous.as_conversational().is_none());
        assert_eq!(Anonymous.implemented_shapes(), vec![ANONYMOUS]);
    }
}

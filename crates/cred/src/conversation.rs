//! Interactive, multi-round verification.
//!
//! The credentials carry a [`Conversation`]: a callback that answers a batch
//! of prompts. A [`ConversationChecker`] hands that callback to an external
//! [`ConversationService`] which asks its questions and decides.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use {async_trait::async_trait, tracing::debug};

use crate::{
    checker::{AvatarId, CredentialsChecker},
    credentials::Credentials,
    error::{Error, Result},
    shape::{CONVERSATION, CredentialShape},
};

/// Service name used when a checker is built without one.
pub const DEFAULT_SERVICE: &str = "warden";

/// How a prompt should be presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PromptKind {
    /// Ask for input without echoing it (passwords).
    EchoOff = 1,
    /// Ask for input and echo it.
    EchoOn = 2,
    /// Show an error message, no input expected.
    ErrorMessage = 3,
    /// Show informational text, no input expected.
    TextInfo = 4,
}

impl PromptKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::EchoOff),
            2 => Some(Self::EchoOn),
            3 => Some(Self::ErrorMessage),
            4 => Some(Self::TextInfo),
            _ => None,
        }
    }

    pub fn expects_input(self) -> bool {
        matches!(self, Self::EchoOff | Self::EchoOn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub text: String,
}

impl Prompt {
    pub fn new(kind: PromptKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// One answer to one prompt. `code` is an application-defined status flag,
/// zero for a plain answer.
#[derive(Clone, PartialEq, Eq)]
pub struct Reply {
    pub response: String,
    pub code: i32,
}

impl Reply {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            code: 0,
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("response", &"[REDACTED]")
            .field("code", &self.code)
            .finish()
    }
}

/// Answers prompts on behalf of the user being authenticated.
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Answer `prompts`, one reply per prompt, in order.
    async fn converse(&self, prompts: &[Prompt]) -> Result<Vec<Reply>>;
}

/// The external system that runs a conversation and decides the outcome.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn authenticate(
        &self,
        service: &str,
        username: &str,
        conversation: &dyn Conversation,
    ) -> Result<()>;
}

// ── Checker ─────────────────────────────────────────────────────────────────

/// Checker for [`CONVERSATION`] credentials backed by a [`ConversationService`].
pub struct ConversationChecker {
    service: String,
    backend: Arc<dyn ConversationService>,
}

impl ConversationChecker {
    pub fn new(backend: Arc<dyn ConversationService>) -> Self {
        Self::with_service(DEFAULT_SERVICE, backend)
    }

    pub fn with_service(service: impl Into<String>, backend: Arc<dyn ConversationService>) -> Self {
        Self {
            service: service.into(),
            backend,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

impl fmt::Debug for ConversationChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationChecker")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialsChecker for ConversationChecker {
    fn credential_shapes(&self) -> &[CredentialShape] {
        &[CONVERSATION]
    }

    async fn request_avatar_id(&self, credentials: &dyn Credentials) -> Result<AvatarId> {
        let creds = credentials
            .as_conversational()
            .ok_or(Error::MalformedCredentials {
                shape: CONVERSATION,
            })?;
        let username = creds.username();

        match self
            .backend
            .authenticate(&self.service, username, creds.conversation())
            .await
        {
            Ok(()) => Ok(AvatarId::named(username)),
            Err(err @ Error::UnauthorizedLogin { .. }) => Err(err),
            Err(err) => {
                debug!(service = %self.service, username, error = %err, "conversation failed");
                Err(Error::unauthorized(err.to_string()))
            },
        }
    }
}

// ── Scripted service ────────────────────────────────────────────────────────

/// One scripted question and the answer it expects.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub prompt: Prompt,
    pub expected: String,
}

impl ScriptStep {
    pub fn new(kind: PromptKind, text: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            prompt: Prompt::new(kind, text),
            expected: expected.into(),
        }
    }
}

/// A [`ConversationService`] driven by a fixed per-user script.
///
/// All of a user's prompts are sent in a single round; the user passes when
/// every reply matches its expected answer with a zero code.
#[derive(Debug, Clone)]
pub struct ScriptedService {
    service: String,
    scripts: HashMap<String, Vec<ScriptStep>>,
    locked: HashSet<String>,
}

impl ScriptedService {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            scripts: HashMap::new(),
            locked: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, steps: Vec<ScriptStep>) -> Self {
        self.scripts.insert(username.into(), steps);
        self
    }

    /// Mark `username` as locked: a correct conversation is still refused.
    #[must_use]
    pub fn with_locked_user(mut self, username: impl Into<String>) -> Self {
        self.locked.insert(username.into());
        self
    }
}

#[async_trait]
impl ConversationService for ScriptedService {
    async fn authenticate(
        &self,
        service: &str,
        username: &str,
        conversation: &dyn Conversation,
    ) -> Result<()> {
        if service != self.service {
            return Err(Error::unauthorized(format!("bad service: {service}")));
        }
        let Some(steps) = self.scripts.get(username) else {
            return Err(Error::unauthorized(format!("bad username: {username}")));
        };

        let prompts: Vec<Prompt> = steps.iter().map(|s| s.prompt.clone()).collect();
        let replies = conversation.converse(&prompts).await?;

        if replies.len() != steps.len() {
            return Err(Error::unauthorized(format!(
                "expected {} replies, got {}",
                steps.len(),
                replies.len()
            )));
        }
        let all_match = steps
            .iter()
            .zip(&replies)
            .all(|(step, reply)| reply.code == 0 && reply.response == step.expected);
        if !all_match {
            return Err(Error::unauthorized("bad conversation"));
        }
        if self.locked.contains(username) {
            return Err(Error::denied(format!("account locked: {username}")));
        }
        Ok(())
    }
}

//! Credential checking and avatar dispatch.
//!
//! A [`Portal`] owns one [`Realm`] and a table of [`CredentialsChecker`]s
//! keyed by [`CredentialShape`]. A login picks the checker for the most
//! derived shape the credentials carry, verifies them into an [`AvatarId`],
//! then asks the realm for an avatar narrowed to one of the requested
//! [`Capability`] interfaces.

pub mod adapt;
pub mod checker;
pub mod conversation;
pub mod credentials;
pub mod error;
pub mod file_db;
pub mod hash;
pub mod portal;
pub mod realm;
pub mod session;
pub mod shape;
pub mod strcred;

pub use {
    adapt::{AdapterRegistry, Avatar},
    checker::{AllowAnonymousAccess, AvatarId, CredentialsChecker, InMemoryPasswordDatabase},
    conversation::{
        Conversation, ConversationChecker, ConversationService, Prompt, PromptKind, Reply,
        ScriptStep, ScriptedService,
    },
    credentials::{
        Anonymous, ConversationCredentials, Credentials, UsernameHashedPassword, UsernamePassword,
    },
    error::{Error, Result},
    file_db::{FileDbOptions, FilePasswordDb, PasswordComparator},
    portal::Portal,
    realm::{Capability, Login, Logout, Mind, Realm},
    session::{SESSION, Session, SessionRealm},
    shape::CredentialShape,
    strcred::{checker_from_spec, checkers_from_config},
};

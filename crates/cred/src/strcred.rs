//! Building checkers from short command-line strings and from configuration.
//!
//! Strings take the form `kind[:argument]`:
//!
//! - `memory:alice:secret:bob:hunter2`: in-memory users, `user:password` pairs
//! - `file:/etc/warden/passwd`: flat file with the default `user:password` layout
//! - `anonymous`: anonymous access

use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    tracing::debug,
    warden_config::{CheckerConfig, FileCheckerConfig, PasswordScheme, PromptStyle, WardenConfig},
};

use crate::{
    checker::{AllowAnonymousAccess, CredentialsChecker, InMemoryPasswordDatabase},
    conversation::{ConversationChecker, PromptKind, ScriptStep, ScriptedService},
    error::{Error, Result},
    file_db::{FileDbOptions, FilePasswordDb},
    hash::argon2_comparator,
};

/// Checker kinds understood by [`checker_from_spec`].
pub const SPEC_KINDS: &[&str] = &["memory", "file", "anonymous"];

/// Build a checker from a `kind[:argument]` string.
pub fn checker_from_spec(spec: &str) -> Result<Arc<dyn CredentialsChecker>> {
    let (kind, argument) = match spec.split_once(':') {
        Some((kind, argument)) => (kind, Some(argument)),
        None => (spec, None),
    };

    let checker: Arc<dyn CredentialsChecker> = match (kind, argument) {
        ("memory", argument) => Arc::new(memory_from_pairs(argument.unwrap_or_default())?),
        ("file", Some(path)) if !path.is_empty() => Arc::new(FilePasswordDb::new(path)),
        ("file", _) => return Err(Error::config("file checker needs a path: file:/path/to/passwd")),
        ("anonymous", None) => Arc::new(AllowAnonymousAccess),
        ("anonymous", Some(_)) => return Err(Error::config("anonymous checker takes no argument")),
        (other, _) => {
            return Err(Error::config(format!(
                "unknown checker kind {other:?}, expected one of: {}",
                SPEC_KINDS.join(", ")
            )));
        },
    };
    debug!(kind, "built checker from string");
    Ok(checker)
}

fn memory_from_pairs(argument: &str) -> Result<InMemoryPasswordDatabase> {
    let fields: Vec<&str> = if argument.is_empty() {
        Vec::new()
    } else {
        argument.split(':').collect()
    };
    if fields.len() % 2 != 0 {
        return Err(Error::config(
            "memory checker needs user:password pairs, got an odd number of fields",
        ));
    }

    let mut db = InMemoryPasswordDatabase::new();
    for pair in fields.chunks_exact(2) {
        db.add_user(pair[0], pair[1]);
    }
    Ok(db)
}

/// Build every checker described by `config`, in order.
pub fn checkers_from_config(config: &WardenConfig) -> Result<Vec<Arc<dyn CredentialsChecker>>> {
    config.checkers.iter().map(checker_from_config).collect()
}

/// Build one checker from its configuration entry.
pub fn checker_from_config(entry: &CheckerConfig) -> Result<Arc<dyn CredentialsChecker>> {
    let checker: Arc<dyn CredentialsChecker> = match entry {
        CheckerConfig::Memory { users } => {
            let mut db = InMemoryPasswordDatabase::new();
            for user in users {
                db.add_user(user.username.as_str(), user.password.expose_secret().as_str());
            }
            Arc::new(db)
        },
        CheckerConfig::File(file) => Arc::new(file_checker(file)?),
        CheckerConfig::Anonymous => Arc::new(AllowAnonymousAccess),
        CheckerConfig::Scripted {
            service,
            users,
            locked,
        } => {
            let mut backend = ScriptedService::new(service.as_str());
            for (username, steps) in users {
                let steps = steps
                    .iter()
                    .map(|step| {
                        let expected = step
                            .answer
                            .as_ref()
                            .map(|a| a.expose_secret().clone())
                            .unwrap_or_default();
                        ScriptStep::new(prompt_kind(step.kind), step.prompt.as_str(), expected)
                    })
                    .collect();
                backend = backend.with_user(username.as_str(), steps);
            }
            for username in locked {
                backend = backend.with_locked_user(username.as_str());
            }
            Arc::new(ConversationChecker::with_service(
                service.as_str(),
                Arc::new(backend),
            ))
        },
    };
    debug!(kind = entry.kind(), "built checker from config");
    Ok(checker)
}

fn file_checker(file: &FileCheckerConfig) -> Result<FilePasswordDb> {
    if file.path.as_os_str().is_empty() {
        return Err(Error::config("file checker needs a path"));
    }
    let options = FileDbOptions {
        delimiter: file.delimiter.clone(),
        username_field: file.username_field,
        password_field: file.password_field,
        rest_of_line: file.rest_of_line,
        case_sensitive: file.case_sensitive,
        cache: file.cache,
        strict: file.strict,
        comparator: match file.hash {
            PasswordScheme::Plain => None,
            PasswordScheme::Argon2 => Some(argon2_comparator()),
        },
    };
    FilePasswordDb::with_options(file.path.clone(), options)
}

fn prompt_kind(style: PromptStyle) -> PromptKind {
    match style {
        PromptStyle::EchoOff => PromptKind::EchoOff,
        PromptStyle::EchoOn => PromptKind::EchoOn,
        PromptStyle::ErrorMessage => PromptKind::ErrorMessage,
        PromptStyle::TextInfo => PromptKind::TextInfo,
    }
}

/// Config schema types (checkers, realm).
use std::{collections::BTreeMap, path::PathBuf};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Checkers registered with the portal, in order. A later checker
    /// replaces an earlier one for any shape both declare.
    pub checkers: Vec<CheckerConfig>,
    pub realm: RealmConfig,
}

impl WardenConfig {
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

/// One credentials checker, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckerConfig {
    /// Fixed in-memory username/password table.
    Memory {
        #[serde(default)]
        users: Vec<MemoryUser>,
    },
    /// Flat delimited password file.
    File(FileCheckerConfig),
    /// Grants the anonymous identity to anonymous credentials.
    Anonymous,
    /// Conversation checker backed by a fixed prompt script per user.
    Scripted {
        #[serde(default = "default_service")]
        service: String,
        #[serde(default)]
        users: BTreeMap<String, Vec<ScriptStepConfig>>,
        /// Users refused even after a correct conversation.
        #[serde(default)]
        locked: Vec<String>,
    },
}

impl CheckerConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::File(_) => "file",
            Self::Anonymous => "anonymous",
            Self::Scripted { .. } => "scripted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryUser {
    pub username: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: Secret<String>,
}

/// Layout and behaviour of a flat password file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCheckerConfig {
    pub path: PathBuf,
    pub delimiter: String,
    /// Zero-based field holding the username.
    pub username_field: usize,
    /// Zero-based field holding the password.
    pub password_field: usize,
    /// Stop splitting after the password field.
    pub rest_of_line: bool,
    pub case_sensitive: bool,
    /// Read the file once and keep it in memory.
    pub cache: bool,
    /// Treat short records as errors instead of skipping them.
    pub strict: bool,
    /// How passwords are stored at rest.
    pub hash: PasswordScheme,
}

impl Default for FileCheckerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            delimiter: ":".into(),
            username_field: 0,
            password_field: 1,
            rest_of_line: false,
            case_sensitive: true,
            cache: false,
            strict: false,
            hash: PasswordScheme::default(),
        }
    }
}

/// Storage scheme for passwords in a flat file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordScheme {
    #[default]
    Plain,
    /// PHC-formatted argon2 hashes.
    Argon2,
}

/// Presentation of one scripted prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    EchoOff,
    EchoOn,
    ErrorMessage,
    TextInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStepConfig {
    pub kind: PromptStyle,
    pub prompt: String,
    /// Expected reply. Informational prompts expect an empty one.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub answer: Option<Secret<String>>,
}

/// Realm settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    /// Interfaces requested when the caller names none, in preference order.
    pub default_interfaces: Vec<String>,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            default_interfaces: vec!["session".into()],
        }
    }
}

fn default_service() -> String {
    "warden".into()
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

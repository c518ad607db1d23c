//! Flat-file username/password store.
//!
//! One record per line, fields split on a configurable delimiter. The
//! username and password live at configurable field indexes; optionally the
//! password runs to the end of the line.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    tokio::sync::OnceCell,
    tracing::{debug, warn},
};

use crate::{
    checker::{AvatarId, CredentialsChecker},
    credentials::Credentials,
    error::{Error, Result},
    shape::{CredentialShape, USERNAME_HASHED_PASSWORD, USERNAME_PASSWORD},
};

/// Decides whether a supplied plaintext password matches a stored field.
///
/// Called as `compare(username, supplied, stored)`, where `username` is the name as the caller
/// supplied it, before any case folding.
pub type PasswordComparator = Arc<dyn Fn(&str, &str, &str) -> bool + Send + Sync>;

/// Record layout and lookup behaviour for a [`FilePasswordDb`].
#[derive(Clone)]
pub struct FileDbOptions {
    pub delimiter: String,
    pub username_field: usize,
    pub password_field: usize,
    /// Treat everything from `password_field` to the end of the line as the
    /// password, delimiters included.
    pub rest_of_line: bool,
    pub case_sensitive: bool,
    /// Parse the file once and serve every later lookup from memory.
    pub cache: bool,
    /// Fail on records with too few fields instead of skipping them.
    pub strict: bool,
    /// Compare plaintext passwords through this function instead of exact
    /// equality. Restricts the checker to plaintext credentials.
    pub comparator: Option<PasswordComparator>,
}

impl Default for FileDbOptions {
    fn default() -> Self {
        Self {
            delimiter: ":".into(),
            username_field: 0,
            password_field: 1,
            rest_of_line: false,
            case_sensitive: true,
            cache: false,
            strict: false,
            comparator: None,
        }
    }
}

impl fmt::Debug for FileDbOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDbOptions")
            .field("delimiter", &self.delimiter)
            .field("username_field", &self.username_field)
            .field("password_field", &self.password_field)
            .field("rest_of_line", &self.rest_of_line)
            .field("case_sensitive", &self.case_sensitive)
            .field("cache", &self.cache)
            .field("strict", &self.strict)
            .field("comparator", &self.comparator.is_some())
            .finish()
    }
}

impl FileDbOptions {
    fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(Error::config("delimiter must not be empty"));
        }
        if self.username_field == self.password_field {
            return Err(Error::config(
                "username and password cannot share a field",
            ));
        }
        if self.rest_of_line && self.password_field < self.username_field {
            return Err(Error::config(
                "rest-of-line passwords must come after the username field",
            ));
        }
        Ok(())
    }
}

/// Checker backed by a delimited password file.
pub struct FilePasswordDb {
    path: PathBuf,
    options: FileDbOptions,
    shapes: Vec<CredentialShape>,
    records: OnceCell<HashMap<String, String>>,
}

impl FilePasswordDb {
    /// A store using the default `username:password` layout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::build(path.into(), FileDbOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: FileDbOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(path.into(), options))
    }

    fn build(path: PathBuf, options: FileDbOptions) -> Self {
        let shapes = if options.comparator.is_some() {
            vec![USERNAME_PASSWORD]
        } else {
            vec![USERNAME_PASSWORD, USERNAME_HASHED_PASSWORD]
        };
        Self {
            path,
            options,
            shapes,
            records: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &FileDbOptions {
        &self.options
    }

    /// Look up `username`, returning the (possibly case-folded) stored name
    /// and its password field.
    ///
    /// Fails with [`Error::UnknownUser`] when no record matches.
    pub async fn get_user(&self, username: &str) -> Result<(String, String)> {
        let key = self.fold(username);

        let found = if self.options.cache {
            let records = self
                .records
                .get_or_try_init(|| async { self.load_map().await })
                .await?;
            records.get(&key).map(|p| (key.clone(), p.clone()))
        } else {
            self.load().await?.into_iter().find(|(u, _)| *u == key)
        };

        found.ok_or_else(|| Error::UnknownUser {
            username: username.to_string(),
        })
    }

    fn fold(&self, username: &str) -> String {
        if self.options.case_sensitive {
            username.to_string()
        } else {
            username.to_lowercase()
        }
    }

    async fn load_map(&self) -> Result<HashMap<String, String>> {
        let mut map = HashMap::new();
        for (user, password) in self.load().await? {
            map.entry(user).or_insert(password);
        }
        debug!(path = %self.path.display(), records = map.len(), "cached password file");
        Ok(map)
    }

    async fn load(&self) -> Result<Vec<(String, String)>> {
        let bytes = tokio::fs::read(&self.path).await?;
        self.parse(&bytes)
    }

    fn parse(&self, contents: &[u8]) -> Result<Vec<(String, String)>> {
        let mut records = Vec::new();
        for (idx, raw) in contents.split(|b| *b == b'\n').enumerate() {
            let line = std::str::from_utf8(raw).map(str::trim_end);
            if matches!(line, Ok("")) {
                continue;
            }
            match line.ok().and_then(|line| self.split_record(line)) {
                Some((user, password)) => records.push((self.fold(user), password)),
                None if self.options.strict => {
                    return Err(Error::MalformedRecord {
                        path: self.path.clone(),
                        line: idx + 1,
                    });
                },
                None => {
                    debug!(path = %self.path.display(), line = idx + 1, "skipping malformed record")
                },
            }
        }
        Ok(records)
    }

    fn split_record<'a>(&self, line: &'a str) -> Option<(&'a str, String)> {
        let delimiter = self.options.delimiter.as_str();
        let fields: Vec<&str> = line.split(delimiter).collect();
        let username = *fields.get(self.options.username_field)?;
        let password = if self.options.rest_of_line {
            fields
                .get(self.options.password_field..)
                .filter(|rest| !rest.is_empty())?
                .join(delimiter)
        } else {
            (*fields.get(self.options.password_field)?).to_string()
        };
        Some((username, password))
    }
}

impl fmt::Debug for FilePasswordDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePasswordDb")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("cached", &self.records.initialized())
            .finish()
    }
}

#[async_trait]
impl CredentialsChecker for FilePasswordDb {
    fn credential_shapes(&self) -> &[CredentialShape] {
        &self.shapes
    }

    async fn request_avatar_id(&self, credentials: &dyn Credentials) -> Result<AvatarId> {
        let creds = credentials
            .as_password()
            .ok_or(Error::MalformedCredentials {
                shape: USERNAME_PASSWORD,
            })?;

        let (username, stored) = match self.get_user(creds.username()).await {
            Ok(record) => record,
            Err(Error::UnknownUser { username }) => {
                debug!(%username, path = %self.path.display(), "unknown user in password file");
                return Err(Error::unauthorized("unknown user"));
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "password file lookup failed");
                return Err(e);
            },
        };

        let matched = match &self.options.comparator {
            Some(compare) => {
                let plain = creds.plaintext().ok_or(Error::MalformedCredentials {
                    shape: USERNAME_PASSWORD,
                })?;
                compare(creds.username(), plain.expose_secret(), &stored)
            },
            None => creds.check_password(&stored),
        };

        if matched {
            Ok(AvatarId::Named(username))
        } else {
            Err(Error::unauthorized("password mismatch"))
        }
    }
}

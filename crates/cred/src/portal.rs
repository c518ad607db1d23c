//! The portal: matches credentials to a checker, then asks the realm for an
//! avatar.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::debug;

use crate::{
    checker::CredentialsChecker,
    credentials::Credentials,
    error::{Error, Result},
    realm::{Capability, Login, Mind, Realm},
    shape::{self, CredentialShape},
};

/// Login dispatcher owning one realm and a shape → checker table.
///
/// Shared across concurrent logins. Registration is a setup-time operation;
/// it is safe at any time, but a login already past checker selection keeps
/// the checker it selected.
pub struct Portal {
    realm: Arc<dyn Realm>,
    checkers: RwLock<HashMap<CredentialShape, Arc<dyn CredentialsChecker>>>,
}

impl Portal {
    pub fn new(realm: Arc<dyn Realm>) -> Self {
        Self {
            realm,
            checkers: RwLock::new(HashMap::new()),
        }
    }

    /// A portal with `checkers` registered in order.
    pub fn with_checkers(
        realm: Arc<dyn Realm>,
        checkers: impl IntoIterator<Item = Arc<dyn CredentialsChecker>>,
    ) -> Self {
        let portal = Self::new(realm);
        for checker in checkers {
            portal.register_checker(checker);
        }
        portal
    }

    pub fn realm(&self) -> &Arc<dyn Realm> {
        &self.realm
    }

    /// Register `checker` for every shape it declares.
    pub fn register_checker(&self, checker: Arc<dyn CredentialsChecker>) {
        self.register_checker_for(checker, &[]);
    }

    /// Register `checker` for `shapes`, or for its declared shapes when
    /// `shapes` is empty. An existing entry for a shape is replaced.
    pub fn register_checker_for(
        &self,
        checker: Arc<dyn CredentialsChecker>,
        shapes: &[CredentialShape],
    ) {
        let shapes = if shapes.is_empty() {
            checker.credential_shapes().to_vec()
        } else {
            shapes.to_vec()
        };

        let mut table = self
            .checkers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for shape in shapes {
            if table.insert(shape, Arc::clone(&checker)).is_some() {
                debug!(%shape, "replaced registered checker");
            } else {
                debug!(%shape, "registered checker");
            }
        }
    }

    /// Shapes that currently have a registered checker, sorted by name.
    pub fn list_credentials_interfaces(&self) -> Vec<CredentialShape> {
        let table = self
            .checkers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut shapes: Vec<_> = table.keys().copied().collect();
        shapes.sort();
        shapes
    }

    /// The checker that would handle `credentials`, with the shape it was
    /// found under.
    ///
    /// Walks the credentials' shapes most derived first and takes the first
    /// one with a registered checker.
    pub fn checker_for(
        &self,
        credentials: &dyn Credentials,
    ) -> Option<(CredentialShape, Arc<dyn CredentialsChecker>)> {
        let table = self
            .checkers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        credentials
            .implemented_shapes()
            .into_iter()
            .find_map(|shape| table.get(&shape).map(|c| (shape, Arc::clone(c))))
    }

    /// Authenticate `credentials` and obtain an avatar narrowed to one of
    /// `interfaces`, in the caller's order of preference.
    ///
    /// The first failure wins: an unmatched credential never reaches a
    /// checker, and a failed verification never reaches the realm.
    pub async fn login(
        &self,
        credentials: &dyn Credentials,
        mind: Mind,
        interfaces: &[Capability],
    ) -> Result<Login> {
        if interfaces.is_empty() {
            return Err(Error::NoInterfacesRequested);
        }

        let Some((shape, checker)) = self.checker_for(credentials) else {
            let shapes = shape::describe(&credentials.implemented_shapes());
            debug!(%shapes, "no checker for credentials");
            return Err(Error::UnhandledCredentials { shapes });
        };

        debug!(%shape, "verifying credentials");
        let avatar_id = checker.request_avatar_id(credentials).await?;

        debug!(%avatar_id, "requesting avatar");
        let login = self
            .realm
            .request_avatar(avatar_id, mind, interfaces)
            .await?;
        debug!(interface = %login.interface, "login complete");
        Ok(login)
    }
}

impl fmt::Debug for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Portal")
            .field("shapes", &self.list_credentials_interfaces())
            .finish_non_exhaustive()
    }
}

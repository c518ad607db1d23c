//! A ready-made realm keeping one long-lived session avatar per identity.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use {async_trait::async_trait, dashmap::DashMap, tracing::debug};

use crate::{
    adapt::{AdapterRegistry, Avatar},
    checker::AvatarId,
    error::{Error, Result},
    realm::{Capability, Login, Logout, Mind, Realm},
};

/// Capability provided natively by [`Session`].
pub const SESSION: Capability = Capability::new("session");

/// Session avatar shared by every login of the same identity.
///
/// Logged in while at least one login has not been logged out.
pub struct Session {
    id: AvatarId,
    active: AtomicUsize,
    logins: AtomicUsize,
}

impl Session {
    fn new(id: AvatarId) -> Self {
        Self {
            id,
            active: AtomicUsize::new(0),
            logins: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &AvatarId {
        &self.id
    }

    pub fn is_logged_in(&self) -> bool {
        self.active.load(Ordering::Acquire) > 0
    }

    /// Logins not yet logged out.
    pub fn active_logins(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Logins over the session's lifetime.
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::Acquire)
    }

    fn mark_logged_in(&self) {
        self.logins.fetch_add(1, Ordering::AcqRel);
        self.active.fetch_add(1, Ordering::AcqRel);
    }

    fn mark_logged_out(&self) {
        let released = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if released.is_err() {
            debug!(id = %self.id, "logout without an active login");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("active", &self.active_logins())
            .field("logins", &self.login_count())
            .finish()
    }
}

impl Avatar for Session {
    fn capabilities(&self) -> &[Capability] {
        &[SESSION]
    }
}

/// Realm handing out [`Session`] avatars, optionally adapted to other
/// capabilities through an [`AdapterRegistry`].
///
/// Sessions live as long as the realm and are never evicted, so it holds one
/// entry per identity that has ever logged in.
#[derive(Default)]
pub struct SessionRealm {
    sessions: DashMap<AvatarId, Arc<Session>>,
    adapters: AdapterRegistry,
}

impl SessionRealm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapters(adapters: AdapterRegistry) -> Self {
        Self {
            sessions: DashMap::new(),
            adapters,
        }
    }

    /// The session for `id`, if it ever logged in.
    pub fn session(&self, id: &AvatarId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|s| Arc::clone(s.value()))
    }

    /// Number of identities with a session.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Capabilities this realm can narrow a session to.
    pub fn supports(&self, capability: &Capability) -> bool {
        *capability == SESSION || self.adapters.has_adapter::<Session>(capability)
    }
}

impl fmt::Debug for SessionRealm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRealm")
            .field("sessions", &self.sessions.len())
            .field("adapters", &self.adapters)
            .finish()
    }
}

#[async_trait]
impl Realm for SessionRealm {
    async fn request_avatar(
        &self,
        avatar_id: AvatarId,
        _mind: Mind,
        interfaces: &[Capability],
    ) -> Result<Login> {
        if !interfaces.iter().any(|c| self.supports(c)) {
            let requested: Vec<_> = interfaces.iter().map(Capability::name).collect();
            return Err(Error::unauthorized(format!(
                "realm cannot provide any of: {}",
                requested.join(", ")
            )));
        }

        let session = Arc::clone(
            self.sessions
                .entry(avatar_id.clone())
                .or_insert_with(|| Arc::new(Session::new(avatar_id)))
                .value(),
        );

        let avatar: Arc<dyn Avatar> = Arc::clone(&session) as Arc<dyn Avatar>;
        let Some((interface, narrowed)) = self.adapters.narrow(avatar, interfaces) else {
            return Err(Error::unauthorized("realm could not adapt session"));
        };

        session.mark_logged_in();
        debug!(
            id = %session.id(),
            %interface,
            active = session.active_logins(),
            "session logged in"
        );

        let logout = Logout::new(move || {
            session.mark_logged_out();
            debug!(id = %session.id(), active = session.active_logins(), "session logged out");
        });
        Ok(Login::new(interface, narrowed, logout))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const VIEWER: Capability = Capability::new("viewer");
    const ADMIN: Capability = Capability::new("admin");

    struct Viewer {
        session: Arc<Session>,
    }

    impl Avatar for Viewer {}

    fn realm() -> SessionRealm {
        SessionRealm::with_adapters(
            AdapterRegistry::new().with(VIEWER, |session: Arc<Session>| Viewer { session }),
        )
    }

    #[test]
    fn logout_without_login_keeps_count_at_zero() {
        let session = Session::new(AvatarId::named("alice"));
        session.mark_logged_out();
        assert_eq!(session.active_logins(), 0);

        session.mark_logged_in();
        session.mark_logged_out();
        session.mark_logged_out();
        assert_eq!(session.active_logins(), 0);
        assert_eq!(session.login_count(), 1);
    }

    #[tokio::test]
    async fn session_login_and_logout() {
        let realm = SessionRealm::new();
        let login = realm
            .request_avatar(AvatarId::named("alice"), Mind::none(), &[SESSION])
            .await
            .unwrap();
        assert_eq!(login.interface, SESSION);

        let session = login.avatar.downcast_ref::<Session>().unwrap();
        assert_eq!(session.id(), &AvatarId::named("alice"));
        assert!(session.is_logged_in());

        login.logout.call();
        let session = realm.session(&AvatarId::named("alice")).unwrap();
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn repeated_logins_reuse_one_session() {
        let realm = SessionRealm::new();
        let first = realm
            .request_avatar(AvatarId::named("bob"), Mind::none(), &[SESSION])
            .await
            .unwrap();
        let second = realm
            .request_avatar(AvatarId::named("bob"), Mind::none(), &[SESSION])
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first.avatar, &second.avatar));
        assert_eq!(realm.len(), 1);

        let session = realm.session(&AvatarId::named("bob")).unwrap();
        assert_eq!(session.login_count(), 2);
        assert_eq!(session.active_logins(), 2);

        first.logout.call();
        assert!(session.is_logged_in());
        second.logout.call();
        assert!(!session.is_logged_in());
        assert_eq!(session.login_count(), 2);
    }

    #[tokio::test]
    async fn first_satisfiable_interface_wins() {
        let realm = realm();
        let login = realm
            .request_avatar(AvatarId::named("carol"), Mind::none(), &[ADMIN, VIEWER, SESSION])
            .await
            .unwrap();
        assert_eq!(login.interface, VIEWER);
        let viewer = login.avatar.downcast_ref::<Viewer>().unwrap();
        assert_eq!(viewer.session.id(), &AvatarId::named("carol"));
        assert!(viewer.session.is_logged_in());
    }

    #[tokio::test]
    async fn unsatisfiable_interfaces_are_unauthorized() {
        let realm = realm();
        let err = realm
            .request_avatar(AvatarId::named("dave"), Mind::none(), &[ADMIN])
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(realm.is_empty());
    }

    #[tokio::test]
    async fn anonymous_identities_get_a_session_too() {
        let realm = SessionRealm::new();
        let login = realm
            .request_avatar(AvatarId::Anonymous, Mind::none(), &[SESSION])
            .await
            .unwrap();
        let session = login.avatar.downcast_ref::<Session>().unwrap();
        assert!(session.id().is_anonymous());
    }
}

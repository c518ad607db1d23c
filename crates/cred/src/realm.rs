//! The realm contract: turning a verified identity into an avatar.

use std::{any::Any, fmt, sync::Arc};

use async_trait::async_trait;

use crate::{adapt::Avatar, checker::AvatarId, error::Result};

/// A kind of session object a realm can mint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability(&'static str);

impl Capability {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.0)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Caller-supplied context passed through to the realm untouched.
#[derive(Clone, Default)]
pub struct Mind(Option<Arc<dyn Any + Send + Sync>>);

impl Mind {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(Some(value))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Mind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Mind(..)"),
            None => f.write_str("Mind(None)"),
        }
    }
}

/// Ends the session created by one successful login.
///
/// Consumed on use, so each login can be logged out at most once.
pub struct Logout(Box<dyn FnOnce() + Send>);

impl Logout {
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(callback))
    }

    /// A logout with nothing to clean up.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn call(self) {
        (self.0)();
    }
}

impl fmt::Debug for Logout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Logout(..)")
    }
}

/// The result of a successful login.
#[derive(Debug)]
pub struct Login {
    /// The requested interface the avatar was narrowed to.
    pub interface: Capability,
    pub avatar: Arc<dyn Avatar>,
    pub logout: Logout,
}

impl Login {
    pub fn new(interface: Capability, avatar: Arc<dyn Avatar>, logout: Logout) -> Self {
        Self {
            interface,
            avatar,
            logout,
        }
    }
}

/// Mints avatars for verified identities.
///
/// Each call is independent; a realm may cache avatars internally, but the
/// portal attaches no meaning to that.
#[async_trait]
pub trait Realm: Send + Sync {
    /// Produce an avatar for `avatar_id` narrowed to the first of
    /// `interfaces` this realm can satisfy.
    ///
    /// `interfaces` is never empty when called through a portal.
    async fn request_avatar(
        &self,
        avatar_id: AvatarId,
        mind: Mind,
        interfaces: &[Capability],
    ) -> Result<Login>;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn mind_round_trips_its_value() {
        let mind = Mind::new(42u32);
        assert_eq!(mind.downcast_ref::<u32>(), Some(&42));
        assert_eq!(mind.downcast_ref::<String>(), None);
        assert!(Mind::none().is_none());
        assert!(Mind::default().downcast_ref::<u32>().is_none());
    }

    #[test]
    fn cloned_mind_shares_value() {
        let mind = Mind::new(String::from("progress"));
        let copy = mind.clone();
        assert_eq!(copy.downcast_ref::<String>().unwrap(), "progress");
    }

    #[test]
    fn logout_runs_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let logout = Logout::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        logout.call();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capability_displays_its_name() {
        const SESSION: Capability = Capability::new("session");
        assert_eq!(SESSION.to_string(), "session");
        assert_eq!(format!("{SESSION:?}"), "Capability(session)");
    }
}

//! Capability narrowing for avatars.
//!
//! An avatar either provides a capability natively or is wrapped by an
//! adapter registered for its exact concrete type and that capability.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use crate::realm::Capability;

/// Object-safe access to the concrete type behind a `dyn Avatar`.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A session object minted by a realm.
pub trait Avatar: AsAny {
    /// Capabilities this object provides without adaptation.
    fn capabilities(&self) -> &[Capability] {
        &[]
    }
}

impl dyn Avatar {
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn is<T: Avatar>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Avatar>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_arc<T: Avatar>(self: Arc<Self>) -> Option<Arc<T>> {
        self.into_any().downcast::<T>().ok()
    }

    pub fn provides_natively(&self, capability: &Capability) -> bool {
        self.capabilities().contains(capability)
    }
}

impl fmt::Debug for dyn Avatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Avatar")
            .field("capabilities", &self.capabilities())
            .finish_non_exhaustive()
    }
}

type AdapterFactory = Arc<dyn Fn(Arc<dyn Avatar>) -> Option<Arc<dyn Avatar>> + Send + Sync>;

/// Adapter factories keyed by (concrete avatar type, capability).
///
/// Populated at startup and read-only afterwards; lookups are exact, with no
/// walk over type hierarchies.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<(TypeId, Capability), AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` to adapt avatars of type `T` to `capability`.
    /// A later registration for the same pair replaces the earlier one.
    pub fn register<T, A, F>(&mut self, capability: Capability, factory: F)
    where
        T: Avatar,
        A: Avatar,
        F: Fn(Arc<T>) -> A + Send + Sync + 'static,
    {
        let adapter: AdapterFactory = Arc::new(move |avatar: Arc<dyn Avatar>| {
            avatar
                .downcast_arc::<T>()
                .map(|original| Arc::new(factory(original)) as Arc<dyn Avatar>)
        });
        self.adapters
            .insert((TypeId::of::<T>(), capability), adapter);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<T, A, F>(mut self, capability: Capability, factory: F) -> Self
    where
        T: Avatar,
        A: Avatar,
        F: Fn(Arc<T>) -> A + Send + Sync + 'static,
    {
        self.register(capability, factory);
        self
    }

    /// Whether `avatar` provides `capability`, natively or through an adapter.
    pub fn provides(&self, avatar: &dyn Avatar, capability: &Capability) -> bool {
        avatar.provides_natively(capability)
            || self
                .adapters
                .contains_key(&(avatar.concrete_type_id(), *capability))
    }

    /// Whether an adapter is registered for avatars of type `T`.
    pub fn has_adapter<T: Avatar>(&self, capability: &Capability) -> bool {
        self.adapters.contains_key(&(TypeId::of::<T>(), *capability))
    }

    /// Expose `capability` on `avatar`: the avatar itself when it provides it
    /// natively, otherwise a fresh adapter around it.
    pub fn adapt(
        &self,
        avatar: Arc<dyn Avatar>,
        capability: &Capability,
    ) -> Option<Arc<dyn Avatar>> {
        if avatar.provides_natively(capability) {
            return Some(avatar);
        }
        let factory = self
            .adapters
            .get(&(avatar.concrete_type_id(), *capability))?;
        factory(avatar)
    }

    /// Adapt `avatar` to the first of `interfaces` it can satisfy.
    pub fn narrow(
        &self,
        avatar: Arc<dyn Avatar>,
        interfaces: &[Capability],
    ) -> Option<(Capability, Arc<dyn Avatar>)> {
        interfaces.iter().find_map(|capability| {
            self.adapt(Arc::clone(&avatar), capability)
                .map(|adapted| (*capability, adapted))
        })
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut capabilities: Vec<_> = self.adapters.keys().map(|(_, c)| c.name()).collect();
        capabilities.sort_unstable();
        f.debug_struct("AdapterRegistry")
            .field("capabilities", &capabilities)
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const GREET: Capability = Capability::new("greet");
    const SHOUT: Capability = Capability::new("shout");
    const WHISPER: Capability = Capability::new("whisper");

    #[derive(Debug)]
    struct Person {
        name: String,
    }

    impl Avatar for Person {
        fn capabilities(&self) -> &[Capability] {
            &[GREET]
        }
    }

    struct Shouter {
        original: Arc<Person>,
    }

    impl Avatar for Shouter {
        fn capabilities(&self) -> &[Capability] {
            &[SHOUT]
        }
    }

    struct Robot;

    impl Avatar for Robot {}

    fn registry() -> AdapterRegistry {
        AdapterRegistry::new().with(SHOUT, |original: Arc<Person>| Shouter { original })
    }

    fn person() -> Arc<dyn Avatar> {
        Arc::new(Person {
            name: "bob".into(),
        })
    }

    #[test]
    fn native_capability_needs_no_adapter() {
        let avatar = person();
        let adapted = registry().adapt(Arc::clone(&avatar), &GREET).unwrap();
        assert!(Arc::ptr_eq(&avatar, &adapted));
    }

    #[test]
    fn registered_adapter_wraps_original() {
        let adapted = registry().adapt(person(), &SHOUT).unwrap();
        let shouter = adapted.downcast_ref::<Shouter>().unwrap();
        assert_eq!(shouter.original.name, "bob");
    }

    #[test]
    fn adaptation_is_repeatable() {
        let registry = registry();
        let avatar = person();
        for _ in 0..3 {
            let adapted = registry.adapt(Arc::clone(&avatar), &SHOUT).unwrap();
            assert!(adapted.is::<Shouter>());
            assert!(adapted.provides_natively(&SHOUT));
        }
    }

    #[test]
    fn adapters_are_keyed_by_exact_type() {
        let registry = registry();
        let robot: Arc<dyn Avatar> = Arc::new(Robot);
        assert!(!registry.provides(robot.as_ref(), &SHOUT));
        assert!(registry.adapt(robot, &SHOUT).is_none());
    }

    #[test]
    fn provides_covers_native_and_adapted() {
        let registry = registry();
        let avatar = person();
        assert!(registry.provides(avatar.as_ref(), &GREET));
        assert!(registry.provides(avatar.as_ref(), &SHOUT));
        assert!(!registry.provides(avatar.as_ref(), &WHISPER));
    }

    #[test]
    fn narrow_picks_first_satisfiable_interface() {
        let registry = registry();
        let (chosen, adapted) = registry.narrow(person(), &[WHISPER, SHOUT, GREET]).unwrap();
        assert_eq!(chosen, SHOUT);
        assert!(adapted.is::<Shouter>());

        assert!(registry.narrow(person(), &[WHISPER]).is_none());
        assert!(registry.narrow(person(), &[]).is_none());
    }

    #[test]
    fn downcast_arc_recovers_concrete_type() {
        let person = person().downcast_arc::<Person>().unwrap();
        assert_eq!(person.name, "bob");
        assert!(person_as_robot().is_none());

        fn person_as_robot() -> Option<Arc<Robot>> {
            let avatar: Arc<dyn Avatar> = Arc::new(Person {
                name: "eve".into(),
            });
            avatar.downcast_arc::<Robot>()
        }
    }
}

//! Credential shapes and their inheritance table.
//!
//! A [`CredentialShape`] names a *kind* of proof. Each shape carries a static
//! list of the shapes it derives from, so a credential implementing a derived
//! shape transitively implements all of its ancestors.

use std::{
    cmp::Ordering,
    collections::{HashSet, VecDeque},
    fmt,
    hash::{Hash, Hasher},
};

/// A tag describing what a credential can prove.
///
/// Identity is the name alone: two shapes with the same name are the same
/// shape regardless of their declared bases.
#[derive(Clone, Copy)]
pub struct CredentialShape {
    name: &'static str,
    bases: &'static [CredentialShape],
}

impl CredentialShape {
    /// A root shape with no bases.
    pub const fn new(name: &'static str) -> Self {
        Self { name, bases: &[] }
    }

    /// A shape deriving from `bases`, closest base first.
    pub const fn derived(name: &'static str, bases: &'static [CredentialShape]) -> Self {
        Self { name, bases }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bases(&self) -> &'static [CredentialShape] {
        self.bases
    }

    /// This shape followed by all of its ancestors, closest first.
    pub fn ancestry(&self) -> Vec<CredentialShape> {
        lineage(std::slice::from_ref(self))
    }

    /// Returns `true` when `other` is this shape or one of its ancestors.
    pub fn extends(&self, other: &CredentialShape) -> bool {
        self.ancestry().contains(other)
    }
}

/// Expand `declared` into the full implemented-shape set, most derived first.
///
/// Declared shapes come first in declaration order, then their bases breadth
/// first. A shape reachable along several paths keeps its closest position.
pub fn lineage(declared: &[CredentialShape]) -> Vec<CredentialShape> {
    let mut seen: HashSet<&'static str> = HashSet::new();
    let mut ordered = Vec::new();
    let mut queue: VecDeque<CredentialShape> = declared.iter().copied().collect();

    while let Some(shape) = queue.pop_front() {
        if !seen.insert(shape.name) {
            continue;
        }
        ordered.push(shape);
        queue.extend(shape.bases.iter().copied());
    }

    ordered
}

/// Render a shape list as a comma-separated string for diagnostics.
pub fn describe(shapes: &[CredentialShape]) -> String {
    shapes
        .iter()
        .map(CredentialShape::name)
        .collect::<Vec<_>>()
        .join(", ")
}

impl PartialEq for CredentialShape {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for CredentialShape {}

impl Hash for CredentialShape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for CredentialShape {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CredentialShape {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(other.name)
    }
}

impl fmt::Debug for CredentialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialShape({})", self.name)
    }
}

impl fmt::Display for CredentialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ── Built-in shapes ─────────────────────────────────────────────────────────

/// Username plus plaintext password.
pub const USERNAME_PASSWORD: CredentialShape = CredentialShape::new("username-password");

/// Username plus a password already hashed by the client.
pub const USERNAME_HASHED_PASSWORD: CredentialShape =
    CredentialShape::new("username-hashed-password");

/// Username plus a conversation callback for multi-round proofs.
pub const CONVERSATION: CredentialShape = CredentialShape::new("conversation");

/// No proof at all.
pub const ANONYMOUS: CredentialShape = CredentialShape::new("anonymous");

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: CredentialShape = CredentialShape::new("root");
    const MIDDLE: CredentialShape = CredentialShape::derived("middle", &[ROOT]);
    const OTHER: CredentialShape = CredentialShape::new("other");
    const LEAF: CredentialShape = CredentialShape::derived("leaf", &[MIDDLE, OTHER]);
    const DIAMOND: CredentialShape = CredentialShape::derived("diamond", &[LEAF, ROOT]);

    #[test]
    fn root_ancestry_is_itself() {
        assert_eq!(ROOT.ancestry(), vec![ROOT]);
    }

    #[test]
    fn ancestry_is_closest_first() {
        assert_eq!(LEAF.ancestry(), vec![LEAF, MIDDLE, OTHER, ROOT]);
    }

    #[test]
    fn diamond_keeps_closest_position() {
        // ROOT is a direct base of DIAMOND, so it sorts before MIDDLE's copy.
        assert_eq!(DIAMOND.ancestry(), vec![DIAMOND, LEAF, ROOT, MIDDLE, OTHER]);
    }

    #[test]
    fn lineage_of_several_declared_shapes() {
        assert_eq!(lineage(&[MIDDLE, OTHER]), vec![MIDDLE, OTHER, ROOT]);
        assert_eq!(lineage(&[MIDDLE, ROOT]), vec![MIDDLE, ROOT]);
    }

    #[test]
    fn extends_walks_ancestors() {
        assert!(LEAF.extends(&ROOT));
        assert!(LEAF.extends(&LEAF));
        assert!(!ROOT.extends(&LEAF));
        assert!(!MIDDLE.extends(&OTHER));
    }

    #[test]
    fn identity_is_by_name() {
        let lookalike = CredentialShape::derived("root", &[OTHER]);
        assert_eq!(lookalike, ROOT);
        let set: HashSet<_> = [ROOT, lookalike].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn describe_joins_names() {
        assert_eq!(describe(&[LEAF, ROOT]), "leaf, root");
        assert_eq!(describe(&[]), "");
    }
}

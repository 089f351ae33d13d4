//! Entity trait: identity plus the relation a record is stored in.

/// Stored record with a stable identity.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Name of the relation (table) rows of this entity live in.
    const RELATION: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

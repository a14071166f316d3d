//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Tenant that owns this entity.
    fn tenant_id(&self) -> crate::TenantId;

    /// Whether the entity is visible from the given tenant scope.
    fn belongs_to(&self, tenant_id: crate::TenantId) -> bool {
        self.tenant_id() == tenant_id
    }
}

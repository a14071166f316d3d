//! Tenancy domain module.
//!
//! Organizations (tenants), their plan quotas, and the memberships tying users
//! to exactly one organization. Pure data + rules, no IO.

pub mod membership;
pub mod organization;

pub use membership::{MemberRole, Membership, MembershipId};
pub use organization::{Organization, PlanLimits, PlanTier, QuotaStatus};

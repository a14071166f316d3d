//! Maps an authenticated user to their organization.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stockledger_core::{TenantId, UserId};
use stockledger_tenancy::{MemberRole, Membership, Organization, PlanLimits};

use crate::guard::SessionId;
use crate::retry::RetryPolicy;
use crate::store::{MembershipStore, OrganizationStore, StoreError};

/// Who is acting, and for which tenant. Required by every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub organization: Organization,
    pub members: Vec<Membership>,
    pub user_id: UserId,
    pub session_id: SessionId,
}

impl TenantContext {
    pub fn new(organization: Organization, members: Vec<Membership>, user_id: UserId) -> Self {
        Self {
            organization,
            members,
            user_id,
            session_id: SessionId::new(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.organization.id
    }

    /// Role of the acting user, if their membership was loaded.
    pub fn current_role(&self) -> Option<MemberRole> {
        self.members
            .iter()
            .find(|m| m.user_id == self.user_id)
            .map(|m| m.role)
    }

    pub fn can_manage_organization(&self) -> bool {
        self.current_role().is_some_and(|r| r.can_manage())
    }

    pub fn is_owner(&self) -> bool {
        self.current_role() == Some(MemberRole::Owner)
    }

    pub fn limits(&self) -> PlanLimits {
        self.organization.limits()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(TenantContext),
    /// The user has no organization. Not an error: onboarding handles it.
    NoTenant,
}

impl Resolution {
    pub fn context(&self) -> Option<&TenantContext> {
        match self {
            Resolution::Resolved(ctx) => Some(ctx),
            Resolution::NoTenant => None,
        }
    }

    pub fn into_context(self) -> Option<TenantContext> {
        match self {
            Resolution::Resolved(ctx) => Some(ctx),
            Resolution::NoTenant => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("tenant lookup failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: StoreError,
    },

    #[error("tenant lookup failed: {0}")]
    Store(#[source] StoreError),
}

pub struct TenantResolver<S> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S> TenantResolver<S>
where
    S: MembershipStore + OrganizationStore,
{
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Find the user's organization.
    ///
    /// Membership and organization lookups are retried on transient errors
    /// per the retry policy; a missing membership or organization row ends
    /// the search at once. The
    /// member list is fetched best-effort and comes back empty on failure.
    pub async fn resolve(&self, user_id: UserId) -> Result<Resolution, ResolveError> {
        let mut attempt: u32 = 0;

        let organization = loop {
            attempt += 1;

            match self.lookup(user_id).await {
                Ok(Some(org)) => break org,
                Ok(None) | Err(StoreError::NotFound(_)) => {
                    debug!(user_id = %user_id, attempt, "user has no organization");
                    return Ok(Resolution::NoTenant);
                }
                Err(e) if !e.is_transient() => {
                    warn!(user_id = %user_id, attempt, error = %e, "tenant lookup failed");
                    return Err(ResolveError::Store(e));
                }
                Err(e) if self.policy.should_retry(attempt) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        user_id = %user_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "tenant lookup unavailable; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(user_id = %user_id, attempt, error = %e, "tenant lookup retries exhausted");
                    return Err(ResolveError::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
            }
        };

        let members = match self.list_members(organization.id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(tenant_id = %organization.id, error = %e, "member list unavailable");
                Vec::new()
            }
        };

        info!(user_id = %user_id, tenant_id = %organization.id, attempt, "tenant resolved");
        Ok(Resolution::Resolved(TenantContext::new(organization, members, user_id)))
    }

    pub async fn list_members(&self, organization_id: TenantId) -> Result<Vec<Membership>, StoreError> {
        self.store.list_memberships(organization_id).await
    }

    async fn lookup(&self, user_id: UserId) -> Result<Option<Organization>, StoreError> {
        let Some(membership) = self.store.find_membership(user_id).await? else {
            return Ok(None);
        };
        self.store.find_organization(membership.organization_id).await
    }
}

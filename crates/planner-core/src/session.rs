//! Session context
//!
//! Role and active tenant of the signed-in user. The navigator owns one and
//! hands it out by reference; nothing else keeps a copy.

use crate::error::PlannerError;
use crate::types::{Tenant, TenantId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Authenticated role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees every tenant; must pick one before any data view
    Administrator,
    /// Bound to its own tenant
    TenantOperator,
}

impl Role {
    /// Check for administrator
    #[inline]
    #[must_use]
    pub fn is_admin(self) -> bool {
        self == Self::Administrator
    }
}

impl FromStr for Role {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Ok(Self::Administrator),
            "ies" | "cliente" | "client" | "operator" | "tenant" => Ok(Self::TenantOperator),
            other => Err(PlannerError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Administrator => "admin",
            Self::TenantOperator => "ies",
        })
    }
}

/// Active tenant as known to the session
///
/// Either half may be missing: operators get the id from the credential and
/// the slug from their profile, administrators from the tenant directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRef {
    /// Numeric id, used by summary endpoints
    pub id: Option<TenantId>,
    /// Slug, used by operational endpoints
    pub slug: Option<String>,
    /// Display name
    pub name: Option<String>,
}

impl TenantRef {
    /// Tenant known only by id
    #[inline]
    #[must_use]
    pub fn from_id(id: TenantId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Builder: set slug
    #[inline]
    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Builder: set name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<&Tenant> for TenantRef {
    fn from(tenant: &Tenant) -> Self {
        Self {
            id: Some(tenant.id),
            slug: Some(tenant.slug.clone()),
            name: Some(tenant.name.clone()),
        }
    }
}

/// Role plus active tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Authenticated role
    pub role: Role,
    /// Active tenant, if any
    pub tenant: Option<TenantRef>,
}

impl SessionContext {
    /// Administrator with no tenant selected
    #[must_use]
    pub fn administrator() -> Self {
        Self {
            role: Role::Administrator,
            tenant: None,
        }
    }

    /// Tenant operator bound to `tenant`
    #[must_use]
    pub fn operator(tenant: TenantRef) -> Self {
        Self {
            role: Role::TenantOperator,
            tenant: Some(tenant),
        }
    }

    /// Builder: set active tenant
    #[inline]
    #[must_use]
    pub fn with_tenant(mut self, tenant: TenantRef) -> Self {
        self.tenant = Some(tenant);
        self
    }

    /// Administrator without a resolvable tenant id
    ///
    /// Derived from the current fields on every call.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.role.is_admin() && self.tenant_id().is_none()
    }

    /// Active tenant id
    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant.as_ref().and_then(|t| t.id)
    }

    /// Active tenant slug, ignoring blank values
    #[must_use]
    pub fn tenant_slug(&self) -> Option<&str> {
        self.tenant
            .as_ref()
            .and_then(|t| t.slug.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Tenant name, else slug, else id
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let tenant = self.tenant.as_ref()?;
        tenant
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.tenant_slug().map(ToString::to_string))
            .or_else(|| tenant.id.map(|id| format!("#{id}")))
    }

    /// Replace or clear the active tenant
    pub fn set_tenant(&mut self, tenant: Option<TenantRef>) {
        self.tenant = tenant;
    }
}

//! Leaf summary fetcher
//!
//! One tenant-scoped request per leaf. A 404 is retried once against the
//! tenant-agnostic legacy endpoint for older backend deployments; nothing
//! else is retried. [`fetch_one`] never fails: errors are encoded in the
//! returned [`FanOutResult`] so the pool always completes.

use crate::api::CatalogApi;
use crate::error::PlannerError;
use crate::types::{FanOutResult, LeafDescriptor, LeafId, LeafOutcome, LeafSummary, TenantId};

/// Fetch one leaf summary, with the 404 fallback when enabled
///
/// # Errors
/// The primary error, or the fallback's error when the fallback ran
pub async fn fetch_leaf_summary(
    api: &dyn CatalogApi,
    tenant_id: TenantId,
    leaf_id: LeafId,
    legacy_fallback: bool,
) -> Result<LeafSummary, PlannerError> {
    match api.leaf_summary(tenant_id, leaf_id).await {
        Err(e) if legacy_fallback && e.is_not_found() => {
            tracing::debug!(%tenant_id, %leaf_id, "summary not found, trying legacy endpoint");
            api.legacy_leaf_summary(leaf_id).await
        }
        other => other,
    }
}

/// Fetch one descriptor's summary and encode the outcome
pub async fn fetch_one(
    api: &dyn CatalogApi,
    tenant_id: TenantId,
    descriptor: LeafDescriptor,
    legacy_fallback: bool,
) -> FanOutResult {
    let outcome =
        match fetch_leaf_summary(api, tenant_id, descriptor.leaf_id, legacy_fallback).await {
            Ok(summary) => LeafOutcome::Success(summary),
            Err(e) => {
                if e.is_role_mismatch() {
                    tracing::warn!(
                        leaf = %descriptor.leaf_id,
                        error = %e,
                        "leaf summary refused by endpoint role requirement"
                    );
                } else {
                    tracing::warn!(leaf = %descriptor.leaf_id, error = %e, "leaf summary failed");
                }
                LeafOutcome::Failure(e)
            }
        };
    FanOutResult {
        descriptor,
        outcome,
    }
}

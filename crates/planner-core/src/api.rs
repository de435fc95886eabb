//! Backend seam
//!
//! Every network request the core makes goes through [`CatalogApi`]. The
//! HTTP implementation lives in `planner-http`; tests use scripted fakes.
//! Implementations return canonical types, already normalised.

use crate::error::PlannerError;
use crate::types::{
    Leaf, LeafId, LeafSummary, OperationalRecord, PatchReceipt, Program, ProgramId, RecordId,
    RecordPatch, Tenant, TenantId,
};
use async_trait::async_trait;

/// Catalog, summary and operational endpoints
///
/// Non-success responses surface as `PlannerError::Http` carrying the status
/// code and the backend's `detail`/`message`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// `GET /catalogo/subprogramas`
    async fn list_programs(&self) -> Result<Vec<Program>, PlannerError>;

    /// `GET /catalogo/subprogramas/{program_id}/submodulos`
    async fn list_leaves(&self, program_id: ProgramId) -> Result<Vec<Leaf>, PlannerError>;

    /// `GET /api/resumen/submodulo/{tenant_id}/{leaf_id}`
    async fn leaf_summary(
        &self,
        tenant_id: TenantId,
        leaf_id: LeafId,
    ) -> Result<LeafSummary, PlannerError>;

    /// `GET /api/resumen/submodulo/{leaf_id}` (tenant taken from the credential)
    async fn legacy_leaf_summary(&self, leaf_id: LeafId) -> Result<LeafSummary, PlannerError>;

    /// `GET /operacion/ies/{tenant_slug}/submodulos/{leaf_id}/evidencias`
    async fn leaf_records(
        &self,
        tenant_slug: &str,
        leaf_id: LeafId,
    ) -> Result<Vec<OperationalRecord>, PlannerError>;

    /// `PATCH /operacion/evidencias/{record_id}`
    async fn patch_record(
        &self,
        record_id: RecordId,
        patch: &RecordPatch,
    ) -> Result<PatchReceipt, PlannerError>;

    /// `GET /ies/`
    async fn list_tenants(&self) -> Result<Vec<Tenant>, PlannerError>;
}

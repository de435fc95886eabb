//! Dashboard driver
//!
//! Connects the navigator to the backend:
//! - runs the effects each transition asks for
//! - runs the summary pipeline (walk, bounded fan-out, aggregate)
//! - applies async results only while their epoch is current
//!
//! The navigator lock is taken for short synchronous sections and is never
//! held across an await.

use crate::aggregate::{aggregate, leaf_detail, AggregateView, LeafDetail};
use crate::api::CatalogApi;
use crate::catalog::CatalogWalker;
use crate::config::PlannerConfig;
use crate::error::{Notice, PlannerError};
use crate::fetch::{fetch_leaf_summary, fetch_one};
use crate::navigation::{
    summary_gate, Effect, FanOutProgress, NavEvent, NavigationState, Navigator, Screen,
    SummaryScreen, View,
};
use crate::pool::BoundedPool;
use crate::session::{SessionContext, TenantRef};
use crate::types::{LeafId, LeafRef, PatchReceipt, RecordId, RecordPatch, Tenant, TenantId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Non-failure outcomes of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    /// Catalog has no programs; no summary was fetched
    NoPrograms,
    /// Programs exist but have no leaves
    NoLeaves,
    /// Aggregated table
    Ready(AggregateView),
}

impl From<SummaryOutcome> for SummaryScreen {
    fn from(outcome: SummaryOutcome) -> Self {
        match outcome {
            SummaryOutcome::NoPrograms => Self::NoPrograms,
            SummaryOutcome::NoLeaves => Self::NoLeaves,
            SummaryOutcome::Ready(view) => Self::Ready { view },
        }
    }
}

/// Walk, fan out, aggregate
pub struct SummaryPipeline<'a> {
    api: &'a dyn CatalogApi,
    pool: BoundedPool,
    legacy_fallback: bool,
}

impl<'a> SummaryPipeline<'a> {
    /// Create pipeline from config
    #[must_use]
    pub fn new(api: &'a dyn CatalogApi, config: &PlannerConfig) -> Self {
        Self {
            api,
            pool: BoundedPool::new(config.fan_out_limit),
            legacy_fallback: config.legacy_summary_fallback,
        }
    }

    /// Run for one tenant, reporting progress after every leaf
    ///
    /// # Errors
    /// Structural failures only (program or leaf listing). Per-leaf failures
    /// become degraded rows.
    pub async fn run<P>(&self, tenant: TenantId, on_progress: P) -> Result<SummaryOutcome, PlannerError>
    where
        P: Fn(FanOutProgress),
    {
        let walk = CatalogWalker::new(self.api).walk().await?;
        if walk.has_no_programs() {
            return Ok(SummaryOutcome::NoPrograms);
        }
        if walk.descriptors.is_empty() {
            return Ok(SummaryOutcome::NoLeaves);
        }

        let total = walk.descriptors.len();
        tracing::info!(
            %tenant,
            leaves = total,
            limit = self.pool.limit(),
            "building summary"
        );
        on_progress(FanOutProgress { done: 0, total });

        let done = AtomicUsize::new(0);
        let done = &done;
        let on_progress = &on_progress;
        let api = self.api;
        let legacy_fallback = self.legacy_fallback;

        let results = self
            .pool
            .run(&walk.descriptors, move |descriptor, _| {
                let descriptor = descriptor.clone();
                async move {
                    let result = fetch_one(api, tenant, descriptor, legacy_fallback).await;
                    let done = done.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::debug!(
                        leaf = %result.descriptor.leaf_id,
                        ok = result.outcome.is_success(),
                        done,
                        total,
                        "leaf finished"
                    );
                    on_progress(FanOutProgress { done, total });
                    result
                }
            })
            .await;

        let view = aggregate(&results);
        tracing::info!(
            %tenant,
            succeeded = view.totals.succeeded,
            degraded = view.totals.degraded,
            "summary built"
        );
        Ok(SummaryOutcome::Ready(view))
    }
}

/// Session-scoped driver
pub struct Dashboard {
    api: Arc<dyn CatalogApi>,
    config: PlannerConfig,
    navigator: Mutex<Navigator>,
    notices: Mutex<Vec<Notice>>,
}

impl Dashboard {
    /// Create driver at `Home`
    #[must_use]
    pub fn new(api: Arc<dyn CatalogApi>, config: PlannerConfig, session: SessionContext) -> Self {
        Self {
            api,
            config,
            navigator: Mutex::new(Navigator::new(session)),
            notices: Mutex::new(Vec::new()),
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Current navigation state
    #[must_use]
    pub fn navigation_state(&self) -> NavigationState {
        self.navigator.lock().state().clone()
    }

    /// Current session
    #[must_use]
    pub fn session(&self) -> SessionContext {
        self.navigator.lock().session().clone()
    }

    /// Renderable snapshot
    #[must_use]
    pub fn screen(&self) -> Screen {
        self.navigator.lock().screen()
    }

    /// Drain queued notices
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }

    /// Return home
    pub async fn go_home(&self) -> Screen {
        self.navigate(NavEvent::GoHome).await
    }

    /// Open the general summary and wait for its pipeline
    pub async fn open_summary(&self) -> Screen {
        self.navigate(NavEvent::OpenSummary).await
    }

    /// Open the operational editor for one leaf and load its records
    pub async fn open_operational(&self, leaf: LeafRef) -> Screen {
        self.navigate(NavEvent::OpenOperational(leaf)).await
    }

    /// Switch or clear the administrator's tenant
    ///
    /// # Errors
    /// `PlannerError::NotPermitted` for tenant operators
    pub async fn select_tenant(&self, tenant: Option<TenantRef>) -> Result<Screen, PlannerError> {
        let transition = self.navigator.lock().change_tenant(tenant)?;
        self.run_effects(transition.effects).await;
        Ok(self.screen())
    }

    /// Switch tenant by id, resolving slug and name through the directory
    ///
    /// # Errors
    /// Directory fetch failure, unknown id, or a non-administrator session
    pub async fn select_tenant_by_id(&self, id: TenantId) -> Result<Screen, PlannerError> {
        let tenants = self.tenants().await?;
        let tenant = tenants
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| PlannerError::InvalidInput(format!("unknown tenant {id}")))?;
        self.select_tenant(Some(TenantRef::from(tenant))).await
    }

    /// Tenant directory
    ///
    /// # Errors
    /// Backend failure
    pub async fn tenants(&self) -> Result<Vec<Tenant>, PlannerError> {
        self.api.list_tenants().await
    }

    /// Detailed summary of one leaf, gated like the general summary
    ///
    /// # Errors
    /// The gate notice, or the fetch failure as a notice
    pub async fn open_leaf_detail(&self, leaf_id: LeafId) -> Result<LeafDetail, Notice> {
        let gate = summary_gate(self.navigator.lock().session());
        let tenant = gate.map_err(|notice| self.notify(notice))?;

        fetch_leaf_summary(
            self.api.as_ref(),
            tenant,
            leaf_id,
            self.config.legacy_summary_fallback,
        )
        .await
        .map(|summary| leaf_detail(&summary))
        .map_err(|e| self.notify(Notice::from_error("Could not load leaf summary", &e)))
    }

    /// Save one operational record
    ///
    /// Only allowed while the operational editor is the visible view. The
    /// patch is normalised and validated before any request is made.
    ///
    /// # Errors
    /// Refusal or failure as a notice
    pub async fn save_record(
        &self,
        record_id: RecordId,
        patch: RecordPatch,
    ) -> Result<PatchReceipt, Notice> {
        let epoch = {
            let nav = self.navigator.lock();
            if nav.session().role.is_admin() {
                return Err(self.notify(Notice::AdminCannotEditOperational));
            }
            if !matches!(nav.state().view, View::Operational { .. }) {
                return Err(self.notify(Notice::Failed {
                    context: "Could not save record".into(),
                    detail: "Open an operational leaf first.".into(),
                }));
            }
            nav.state().epoch
        };

        let patch = patch
            .normalized()
            .map_err(|e| self.notify(Notice::from_error("Could not save record", &e)))?;

        match self.api.patch_record(record_id, &patch).await {
            Ok(receipt) => {
                let applied = self
                    .navigator
                    .lock()
                    .apply_saved(epoch, record_id, &patch, &receipt);
                tracing::info!(record = %record_id, applied, "record saved");
                self.notify(Notice::Saved);
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(record = %record_id, error = %e, "record save failed");
                Err(self.notify(Notice::from_error("Could not save record", &e)))
            }
        }
    }

    async fn navigate(&self, event: NavEvent) -> Screen {
        let transition = self.navigator.lock().dispatch(event);
        self.run_effects(transition.effects).await;
        self.screen()
    }

    async fn run_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(notice) => {
                    self.notify(notice);
                }
                Effect::BuildSummary { tenant, epoch } => self.build_summary(tenant, epoch).await,
                Effect::LoadRecords { leaf, slug, epoch } => {
                    self.load_records(&leaf, &slug, epoch).await;
                }
            }
        }
    }

    async fn build_summary(&self, tenant: TenantId, epoch: u64) {
        let pipeline = SummaryPipeline::new(self.api.as_ref(), &self.config);
        let outcome = pipeline
            .run(tenant, |progress| {
                self.navigator.lock().apply_progress(epoch, progress);
            })
            .await;

        let screen = match outcome {
            Ok(outcome) => SummaryScreen::from(outcome),
            Err(e) => {
                tracing::warn!(%tenant, error = %e, "summary build failed");
                SummaryScreen::Failed {
                    notice: Notice::from_error("Could not load the catalog", &e),
                }
            }
        };

        let failure = match &screen {
            SummaryScreen::Failed { notice } => Some(notice.clone()),
            _ => None,
        };
        if self.navigator.lock().apply_summary(epoch, screen) {
            if let Some(notice) = failure {
                self.notify(notice);
            }
        }
    }

    async fn load_records(&self, leaf: &LeafRef, slug: &str, epoch: u64) {
        let records = self
            .api
            .leaf_records(slug, leaf.id)
            .await
            .map_err(|e| {
                tracing::warn!(leaf = %leaf.id, error = %e, "operational records failed");
                Notice::from_error("Could not load operational records", &e)
            });

        let failure = records.as_ref().err().cloned();
        if self.navigator.lock().apply_records(epoch, records) {
            if let Some(notice) = failure {
                self.notify(notice);
            }
        }
    }

    fn notify(&self, notice: Notice) -> Notice {
        self.notices.lock().push(notice.clone());
        notice
    }
}

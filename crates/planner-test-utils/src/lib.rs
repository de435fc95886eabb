//! Testing utilities for the planner workspace
//!
//! [`FakeCatalog`] is a scripted in-memory backend: per-leaf latency,
//! failure injection, a gate that holds summary requests until opened, and
//! counters for calls and in-flight requests.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use planner_core::{
    CatalogApi, Leaf, LeafId, LeafRecord, LeafSummary, OperationalRecord, PatchReceipt,
    PlannerError, Program, ProgramId, RecordId, RecordPatch, Tenant, TenantId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Holds requests until opened
#[derive(Debug, Default)]
pub struct Gate {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_open() {
                return;
            }
            notified.await;
        }
    }
}

/// Call counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub list_programs: usize,
    pub list_leaves: Vec<ProgramId>,
    pub summaries: Vec<(TenantId, LeafId)>,
    pub legacy_summaries: Vec<LeafId>,
    pub records: Vec<(String, LeafId)>,
    pub patches: Vec<(RecordId, RecordPatch)>,
    pub list_tenants: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

/// Scripted backend
#[derive(Debug, Default)]
pub struct FakeCatalog {
    programs: Vec<Program>,
    leaves: HashMap<ProgramId, Vec<Leaf>>,
    summaries: HashMap<LeafId, Result<LeafSummary, PlannerError>>,
    legacy: HashMap<LeafId, Result<LeafSummary, PlannerError>>,
    records: HashMap<LeafId, Vec<OperationalRecord>>,
    tenants: Vec<Tenant>,
    delays: HashMap<LeafId, Duration>,
    program_failure: Option<PlannerError>,
    leaf_failure: HashMap<ProgramId, PlannerError>,
    gate: Option<Arc<Gate>>,
    log: Mutex<CallLog>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a program and its leaves, named `P{id}` / `L{id}`
    pub fn with_program(mut self, id: i64, leaf_ids: &[i64]) -> Self {
        let program = ProgramId(id);
        self.programs.push(Program {
            id: program,
            name: format!("P{id}"),
        });
        self.leaves.insert(
            program,
            leaf_ids
                .iter()
                .map(|&leaf| Leaf {
                    id: LeafId(leaf),
                    name: format!("L{leaf}"),
                    parent_program_id: program,
                })
                .collect(),
        );
        self
    }

    pub fn with_summary(mut self, leaf: i64, summary: LeafSummary) -> Self {
        self.summaries.insert(LeafId(leaf), Ok(summary));
        self
    }

    pub fn with_failure(mut self, leaf: i64, error: PlannerError) -> Self {
        self.summaries.insert(LeafId(leaf), Err(error));
        self
    }

    pub fn with_legacy_summary(mut self, leaf: i64, summary: LeafSummary) -> Self {
        self.legacy.insert(LeafId(leaf), Ok(summary));
        self
    }

    pub fn with_delay(mut self, leaf: i64, delay: Duration) -> Self {
        self.delays.insert(LeafId(leaf), delay);
        self
    }

    pub fn with_records(mut self, leaf: i64, records: Vec<OperationalRecord>) -> Self {
        self.records.insert(LeafId(leaf), records);
        self
    }

    pub fn with_tenant(mut self, id: i64, name: &str, slug: &str) -> Self {
        self.tenants.push(Tenant {
            id: TenantId(id),
            name: name.into(),
            slug: slug.into(),
        });
        self
    }

    pub fn with_program_failure(mut self, error: PlannerError) -> Self {
        self.program_failure = Some(error);
        self
    }

    pub fn with_leaf_list_failure(mut self, program: i64, error: PlannerError) -> Self {
        self.leaf_failure.insert(ProgramId(program), error);
        self
    }

    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.lock().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.log.lock().in_flight
    }

    /// Yield until at least `n` summary requests are in flight
    pub async fn wait_for_in_flight(&self, n: usize) {
        while self.in_flight() < n {
            tokio::task::yield_now().await;
        }
    }

    fn enter(&self) {
        let mut log = self.log.lock();
        log.in_flight += 1;
        log.peak_in_flight = log.peak_in_flight.max(log.in_flight);
    }

    fn exit(&self) {
        self.log.lock().in_flight -= 1;
    }

    async fn hold(&self, leaf: LeafId) {
        if let Some(delay) = self.delays.get(&leaf) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
    }
}

fn not_found() -> PlannerError {
    PlannerError::http(404, "Not Found")
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn list_programs(&self) -> Result<Vec<Program>, PlannerError> {
        self.log.lock().list_programs += 1;
        match &self.program_failure {
            Some(e) => Err(e.clone()),
            None => Ok(self.programs.clone()),
        }
    }

    async fn list_leaves(&self, program_id: ProgramId) -> Result<Vec<Leaf>, PlannerError> {
        self.log.lock().list_leaves.push(program_id);
        if let Some(e) = self.leaf_failure.get(&program_id) {
            return Err(e.clone());
        }
        Ok(self.leaves.get(&program_id).cloned().unwrap_or_default())
    }

    async fn leaf_summary(
        &self,
        tenant_id: TenantId,
        leaf_id: LeafId,
    ) -> Result<LeafSummary, PlannerError> {
        self.log.lock().summaries.push((tenant_id, leaf_id));
        self.enter();
        self.hold(leaf_id).await;
        self.exit();
        self.summaries
            .get(&leaf_id)
            .cloned()
            .unwrap_or_else(|| Err(not_found()))
    }

    async fn legacy_leaf_summary(&self, leaf_id: LeafId) -> Result<LeafSummary, PlannerError> {
        self.log.lock().legacy_summaries.push(leaf_id);
        self.legacy
            .get(&leaf_id)
            .cloned()
            .unwrap_or_else(|| Err(not_found()))
    }

    async fn leaf_records(
        &self,
        tenant_slug: &str,
        leaf_id: LeafId,
    ) -> Result<Vec<OperationalRecord>, PlannerError> {
        self.log
            .lock()
            .records
            .push((tenant_slug.to_string(), leaf_id));
        Ok(self.records.get(&leaf_id).cloned().unwrap_or_default())
    }

    async fn patch_record(
        &self,
        record_id: RecordId,
        patch: &RecordPatch,
    ) -> Result<PatchReceipt, PlannerError> {
        self.log.lock().patches.push((record_id, patch.clone()));
        Ok(PatchReceipt {
            stored_id: Some(1000 + record_id.0),
            updated_at: Some("2024-03-01T12:00:00Z".into()),
        })
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, PlannerError> {
        self.log.lock().list_tenants += 1;
        Ok(self.tenants.clone())
    }
}

/// Summary with the given evidence total and average progress
pub fn summary(evidence: u64, progress: f64) -> LeafSummary {
    LeafSummary {
        total_evidence_count: evidence,
        average_progress: Some(progress),
        ..LeafSummary::default()
    }
}

/// Raw summary record
pub fn leaf_record(responsible: &str, updated_at: &str) -> LeafRecord {
    LeafRecord {
        responsible: responsible.into(),
        updated_at: Some(updated_at.into()),
        ..LeafRecord::default()
    }
}

/// Blank operational row
pub fn operational_record(id: i64) -> OperationalRecord {
    OperationalRecord {
        id: RecordId(id),
        stored_id: None,
        order: id,
        title: format!("Evidence {id}"),
        presents: false,
        valuation: 0,
        responsible: None,
        start_date: None,
        end_date: None,
        progress_pct: 0,
        updated_at: None,
    }
}

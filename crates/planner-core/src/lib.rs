//! Planner Core - tenant dashboard engine
//!
//! Builds a tenant's general summary from a two-level catalog:
//! - Walks programs and their leaves into a flat work list
//! - Fetches one backend summary per leaf through a bounded worker pool
//! - Aggregates the results into a table, isolating per-leaf failures
//! - Gates every view behind a role- and tenant-aware state machine
//!
//! # Example
//!
//! ```rust,ignore
//! use planner_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(api: Arc<dyn CatalogApi>) {
//! let session = SessionContext::operator(TenantRef::from_id(TenantId(7)));
//! let dashboard = Dashboard::new(api, PlannerConfig::new(), session);
//!
//! if let Screen::Summary { summary: SummaryScreen::Ready { view } } = dashboard.open_summary().await {
//!     println!("{} leaves, {} degraded", view.totals.leaves, view.totals.degraded);
//! }
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod aggregate;
pub mod api;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod navigation;
pub mod pool;
pub mod session;
pub mod types;
pub mod wire;

// Re-exports for convenience
pub use aggregate::{
    aggregate, leaf_detail, AggregateView, LeafDetail, RowStatus, SummaryRow, SummaryTotals,
    ValuationBucket, ValuationBuckets,
};
pub use api::CatalogApi;
pub use catalog::{walk_catalog, CatalogWalk, CatalogWalker};
pub use config::{PlannerConfig, DEFAULT_FAN_OUT_LIMIT};
pub use dashboard::{Dashboard, SummaryOutcome, SummaryPipeline};
pub use error::{Notice, PlannerError, Severity};
pub use fetch::{fetch_leaf_summary, fetch_one};
pub use navigation::{
    summary_gate, transition, Effect, FanOutProgress, NavEvent, NavigationState, Navigator,
    RecordsScreen, Screen, SummaryScreen, Transition, View,
};
pub use pool::{run_bounded, BoundedPool};
pub use session::{Role, SessionContext, TenantRef};
pub use types::{
    FanOutResult, Leaf, LeafDescriptor, LeafId, LeafOutcome, LeafRecord, LeafRef, LeafSummary,
    OperationalRecord, PatchReceipt, PresenceCounts, Program, ProgramId, ProgressBands, RecordId,
    RecordPatch, Tenant, TenantId, ValuationLevel,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a dashboard
    pub use crate::{
        CatalogApi, Dashboard, LeafId, LeafRef, Notice, PlannerConfig, PlannerError, RecordId,
        RecordPatch, Role, Screen, SessionContext, SummaryScreen, TenantId, TenantRef,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

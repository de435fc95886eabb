//! Aggregation of fan-out results into renderable views
//!
//! Everything here is a pure function of its input. Calling [`aggregate`]
//! twice on the same results yields equal views; nothing is memoized.

use crate::error::Notice;
use crate::types::{
    FanOutResult, LeafId, LeafOutcome, LeafRecord, LeafSummary, PresenceCounts, ProgramId,
    ProgressBands,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::Serialize;

/// Placeholder for absent text and dates
pub const PLACEHOLDER: &str = "—";

/// Per-row status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    /// Summary retrieved
    Ok,
    /// Summary fetch failed; numbers are zeroed
    Degraded {
        /// Why
        notice: Notice,
    },
}

/// One row of the general summary table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    /// Program ID
    pub program_id: ProgramId,
    /// Program name
    pub program_name: String,
    /// Leaf ID
    pub leaf_id: LeafId,
    /// Leaf name
    pub leaf_name: String,
    /// First non-empty responsible party among the records
    pub responsible: Option<String>,
    /// Latest parseable record update, in its own offset
    pub last_updated: Option<DateTime<FixedOffset>>,
    /// Average progress clamped to `[0, 100]`
    pub progress: f64,
    /// Backend evidence total
    pub evidence_count: u64,
    /// Row status
    pub status: RowStatus,
}

impl SummaryRow {
    /// Check for a degraded row
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, RowStatus::Degraded { .. })
    }

    /// Responsible party or placeholder
    #[must_use]
    pub fn responsible_label(&self) -> &str {
        self.responsible.as_deref().unwrap_or(PLACEHOLDER)
    }

    /// `YYYY-MM-DD` as written by the backend, or placeholder
    #[must_use]
    pub fn last_updated_label(&self) -> String {
        self.last_updated
            .map_or_else(|| PLACEHOLDER.to_string(), |t| t.date_naive().to_string())
    }

    /// Whole percentage, e.g. `67%`
    #[must_use]
    pub fn progress_label(&self) -> String {
        format!("{:.0}%", self.progress.round())
    }
}

/// Row counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryTotals {
    /// Rows
    pub leaves: usize,
    /// Rows with a summary
    pub succeeded: usize,
    /// Degraded rows
    pub degraded: usize,
    /// Evidence across successful rows
    pub evidence: u64,
}

/// General summary view, rebuilt on every fan-out completion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateView {
    /// One row per result, same order
    pub rows: Vec<SummaryRow>,
    /// Row counts
    pub totals: SummaryTotals,
    /// Sum of backend progress bands over successful rows
    pub progress_bands: ProgressBands,
    /// Latest update across all rows
    pub last_updated_overall: Option<DateTime<FixedOffset>>,
}

/// Reduce fan-out results into the general summary view
///
/// Failed leaves keep their row, so `rows.len() == results.len()`.
#[must_use]
pub fn aggregate(results: &[FanOutResult]) -> AggregateView {
    let mut view = AggregateView {
        rows: Vec::with_capacity(results.len()),
        ..AggregateView::default()
    };

    for result in results {
        let d = &result.descriptor;
        let row = match &result.outcome {
            LeafOutcome::Success(summary) => {
                view.totals.succeeded += 1;
                view.totals.evidence += summary.total_evidence_count;
                view.progress_bands = view.progress_bands.merged(summary.progress_bands);
                SummaryRow {
                    program_id: d.program_id,
                    program_name: d.program_name.clone(),
                    leaf_id: d.leaf_id,
                    leaf_name: d.leaf_name.clone(),
                    responsible: pick_responsible(&summary.records),
                    last_updated: pick_last_updated(&summary.records),
                    progress: clamp_progress(summary.average_progress),
                    evidence_count: summary.total_evidence_count,
                    status: RowStatus::Ok,
                }
            }
            LeafOutcome::Failure(error) => {
                view.totals.degraded += 1;
                SummaryRow {
                    program_id: d.program_id,
                    program_name: d.program_name.clone(),
                    leaf_id: d.leaf_id,
                    leaf_name: d.leaf_name.clone(),
                    responsible: None,
                    last_updated: None,
                    progress: 0.0,
                    evidence_count: 0,
                    status: RowStatus::Degraded {
                        notice: Notice::from_error("Could not load leaf summary", error),
                    },
                }
            }
        };
        view.last_updated_overall = view.last_updated_overall.max(row.last_updated);
        view.rows.push(row);
    }

    view.totals.leaves = view.rows.len();
    view
}

/// First non-empty responsible party in record order
#[must_use]
pub fn pick_responsible(records: &[LeafRecord]) -> Option<String> {
    records
        .iter()
        .map(|r| r.responsible.trim())
        .find(|r| !r.is_empty())
        .map(ToString::to_string)
}

/// Latest parseable `updated_at`; unparseable and missing ones are ignored
///
/// Compared by instant; the winner keeps the offset it was written with.
#[must_use]
pub fn pick_last_updated(records: &[LeafRecord]) -> Option<DateTime<FixedOffset>> {
    records
        .iter()
        .filter_map(|r| r.updated_at.as_deref().and_then(parse_timestamp))
        .max()
}

/// Clamp a backend average into `[0, 100]`; absent or non-finite is zero
#[must_use]
pub fn clamp_progress(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse the timestamp shapes the backend emits
///
/// Values with an offset keep it, so the calendar day stays the one the
/// backend wrote. Values without one are read as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t);
    }
    if let Some(t) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
    {
        return Some(t);
    }
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))?;
    FixedOffset::east_opt(0).map(|utc| utc.from_utc_datetime(&naive))
}

/// Parse the date part of a date or timestamp
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Valuation band of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationBucket {
    /// `v <= 0`
    Deficient,
    /// `0 < v <= 35`
    BarelySatisfactory,
    /// `35 < v <= 70`
    NearlySatisfactory,
    /// `v > 70`
    Satisfactory,
    /// No numeric valuation
    NoData,
}

impl ValuationBucket {
    /// Band for a valuation; upper edges are inclusive
    #[must_use]
    pub fn of(valuation: Option<f64>) -> Self {
        match valuation {
            Some(v) if v.is_nan() => Self::NoData,
            Some(v) if v <= 0.0 => Self::Deficient,
            Some(v) if v <= 35.0 => Self::BarelySatisfactory,
            Some(v) if v <= 70.0 => Self::NearlySatisfactory,
            Some(_) => Self::Satisfactory,
            None => Self::NoData,
        }
    }
}

/// Valuation band counts over a leaf's records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValuationBuckets {
    /// `v <= 0`
    pub deficient: u64,
    /// `0 < v <= 35`
    pub barely_satisfactory: u64,
    /// `35 < v <= 70`
    pub nearly_satisfactory: u64,
    /// `v > 70`
    pub satisfactory: u64,
    /// No numeric valuation
    pub no_data: u64,
}

impl ValuationBuckets {
    /// Count records into bands
    #[must_use]
    pub fn from_records(records: &[LeafRecord]) -> Self {
        let mut buckets = Self::default();
        for record in records {
            let slot = match ValuationBucket::of(record.valuation) {
                ValuationBucket::Deficient => &mut buckets.deficient,
                ValuationBucket::BarelySatisfactory => &mut buckets.barely_satisfactory,
                ValuationBucket::NearlySatisfactory => &mut buckets.nearly_satisfactory,
                ValuationBucket::Satisfactory => &mut buckets.satisfactory,
                ValuationBucket::NoData => &mut buckets.no_data,
            };
            *slot += 1;
        }
        buckets
    }

    /// Sum of all five bands
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.deficient
            + self.barely_satisfactory
            + self.nearly_satisfactory
            + self.satisfactory
            + self.no_data
    }
}

/// Detailed view of a single leaf
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafDetail {
    /// Backend evidence total
    pub evidence_count: u64,
    /// Average progress clamped to `[0, 100]`
    pub average_progress: f64,
    /// Average valuation, if any record has one
    pub average_valuation: Option<f64>,
    /// Earliest planned start
    pub min_start_date: Option<NaiveDate>,
    /// Latest planned end
    pub max_end_date: Option<NaiveDate>,
    /// Backend-computed months until the latest end
    pub months_to_finish: Option<i64>,
    /// Presented counts
    pub presence: PresenceCounts,
    /// Client-side valuation bands
    pub valuation_buckets: ValuationBuckets,
    /// Backend progress bands
    pub progress_bands: ProgressBands,
    /// First non-empty responsible party
    pub responsible: Option<String>,
    /// Latest parseable record update, in its own offset
    pub last_updated: Option<DateTime<FixedOffset>>,
    /// Raw records in backend order
    pub records: Vec<LeafRecord>,
}

/// Build the detailed view of one leaf summary
#[must_use]
pub fn leaf_detail(summary: &LeafSummary) -> LeafDetail {
    LeafDetail {
        evidence_count: summary.total_evidence_count,
        average_progress: clamp_progress(summary.average_progress),
        average_valuation: summary.average_valuation.filter(|v| v.is_finite()),
        min_start_date: summary.min_start_date.as_deref().and_then(parse_date),
        max_end_date: summary.max_end_date.as_deref().and_then(parse_date),
        months_to_finish: summary.months_to_finish,
        presence: summary.presence,
        valuation_buckets: ValuationBuckets::from_records(&summary.records),
        progress_bands: summary.progress_bands,
        responsible: pick_responsible(&summary.records),
        last_updated: pick_last_updated(&summary.records),
        records: summary.records.clone(),
    }
}

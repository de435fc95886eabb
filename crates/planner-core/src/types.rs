//! Core types for the planner
//!
//! Defines the canonical data model:
//! - Catalog entries (programs and their leaves)
//! - Flattened leaf descriptors used as fan-out work units
//! - Backend-aggregated leaf summaries and their raw records
//! - Per-leaf fan-out outcomes
//! - Operational records and patches for the editor

use crate::error::PlannerError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(
    /// Program ("subprograma") identifier
    ProgramId
);
id_newtype!(
    /// Leaf ("submódulo") identifier, globally unique in practice
    LeafId
);
id_newtype!(
    /// Tenant ("IES") identifier
    TenantId
);
id_newtype!(
    /// Operational record identifier (the evidence item the record belongs to)
    RecordId
);

/// Root-level catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Program ID
    pub id: ProgramId,
    /// Display name
    pub name: String,
}

/// Catalog item nested under a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    /// Leaf ID
    pub id: LeafId,
    /// Display name
    pub name: String,
    /// Owning program
    pub parent_program_id: ProgramId,
}

/// Flattened walk unit, one per program × leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeafDescriptor {
    /// Owning program ID
    pub program_id: ProgramId,
    /// Owning program name
    pub program_name: String,
    /// Leaf ID
    pub leaf_id: LeafId,
    /// Leaf name
    pub leaf_name: String,
}

impl LeafDescriptor {
    /// Build from a program and one of its leaves
    #[inline]
    #[must_use]
    pub fn new(program: &Program, leaf: &Leaf) -> Self {
        Self {
            program_id: program.id,
            program_name: program.name.clone(),
            leaf_id: leaf.id,
            leaf_name: leaf.name.clone(),
        }
    }

    /// Reference used by the navigation layer
    #[inline]
    #[must_use]
    pub fn leaf_ref(&self) -> LeafRef {
        LeafRef {
            id: self.leaf_id,
            name: self.leaf_name.clone(),
        }
    }
}

/// Minimal leaf identity carried by views
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeafRef {
    /// Leaf ID
    pub id: LeafId,
    /// Leaf name
    pub name: String,
}

impl From<&Leaf> for LeafRef {
    fn from(leaf: &Leaf) -> Self {
        Self {
            id: leaf.id,
            name: leaf.name.clone(),
        }
    }
}

/// Raw per-leaf operational row as returned inside a summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafRecord {
    /// Responsible party, empty when unset
    pub responsible: String,
    /// Valuation score
    pub valuation: Option<f64>,
    /// Progress percentage
    pub progress_pct: Option<f64>,
    /// Whether the evidence is presented
    pub presents: Option<bool>,
    /// Planned start
    pub start_date: Option<String>,
    /// Planned end
    pub end_date: Option<String>,
    /// Last update timestamp, unparsed
    pub updated_at: Option<String>,
    /// Evidence title
    pub title: Option<String>,
}

/// Backend-supplied progress band counts
///
/// Bands are `[0,24]`, `[25,49]`, `[50,74]`, `[75,100]` plus no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBands {
    /// `[0,24]`
    pub band_0_24: u64,
    /// `[25,49]`
    pub band_25_49: u64,
    /// `[50,74]`
    pub band_50_74: u64,
    /// `[75,100]`
    pub band_75_100: u64,
    /// No progress value
    pub no_data: u64,
}

impl ProgressBands {
    /// Sum of all five bands
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.band_0_24 + self.band_25_49 + self.band_50_74 + self.band_75_100 + self.no_data
    }

    /// Element-wise sum
    #[must_use]
    pub fn merged(self, other: Self) -> Self {
        Self {
            band_0_24: self.band_0_24 + other.band_0_24,
            band_25_49: self.band_25_49 + other.band_25_49,
            band_50_74: self.band_50_74 + other.band_50_74,
            band_75_100: self.band_75_100 + other.band_75_100,
            no_data: self.no_data + other.no_data,
        }
    }
}

/// Yes / no / no-data counts for the "presents" flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceCounts {
    /// Presented
    pub yes: u64,
    /// Not presented
    pub no: u64,
    /// Unknown
    pub no_data: u64,
}

/// Backend-computed aggregate for one leaf
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafSummary {
    /// Total evidence rows
    pub total_evidence_count: u64,
    /// Average progress (0-100), absent when no record carries progress
    pub average_progress: Option<f64>,
    /// Average valuation
    pub average_valuation: Option<f64>,
    /// Earliest planned start
    pub min_start_date: Option<String>,
    /// Latest planned end
    pub max_end_date: Option<String>,
    /// Months until the latest planned end
    pub months_to_finish: Option<i64>,
    /// Progress bands, zeroed when the backend omits them
    pub progress_bands: ProgressBands,
    /// Presence counts, zeroed when the backend omits them
    pub presence: PresenceCounts,
    /// Raw records in backend order
    pub records: Vec<LeafRecord>,
}

/// Outcome of one leaf fetch
#[derive(Debug, Clone, PartialEq)]
pub enum LeafOutcome {
    /// Summary retrieved
    Success(LeafSummary),
    /// Fetch failed, error encoded
    Failure(PlannerError),
}

impl LeafOutcome {
    /// Check for success
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// One fan-out result, index-aligned with the descriptor list
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutResult {
    /// Input descriptor
    pub descriptor: LeafDescriptor,
    /// Success or encoded failure
    pub outcome: LeafOutcome,
}

/// Tenant directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant ID
    pub id: TenantId,
    /// Display name
    pub name: String,
    /// URL slug
    pub slug: String,
}

/// Row of the operational editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalRecord {
    /// Record (evidence item) ID, used for patching
    pub id: RecordId,
    /// Stored row ID, absent until first save
    pub stored_id: Option<i64>,
    /// Display order
    pub order: i64,
    /// Evidence title
    pub title: String,
    /// Presented flag
    pub presents: bool,
    /// Valuation score (0-100)
    pub valuation: i64,
    /// Responsible party
    pub responsible: Option<String>,
    /// Planned start
    pub start_date: Option<NaiveDate>,
    /// Planned end
    pub end_date: Option<NaiveDate>,
    /// Progress percentage (0-100)
    pub progress_pct: i64,
    /// Last update timestamp, unparsed
    pub updated_at: Option<String>,
}

impl OperationalRecord {
    /// Valuation level shown in the editor's picker
    #[inline]
    #[must_use]
    pub fn valuation_level(&self) -> ValuationLevel {
        ValuationLevel::from_score(self.valuation)
    }

    /// Fold a saved patch and its receipt into the row
    pub fn apply_patch(&mut self, patch: &RecordPatch, receipt: &PatchReceipt) {
        if let Some(presents) = patch.presents {
            self.presents = presents;
        }
        if let Some(valuation) = patch.valuation {
            self.valuation = valuation;
        }
        if let Some(responsible) = &patch.responsible {
            self.responsible = Some(responsible.clone()).filter(|r| !r.is_empty());
        }
        if patch.start_date.is_some() {
            self.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            self.end_date = patch.end_date;
        }
        if let Some(progress) = patch.progress_pct {
            self.progress_pct = progress;
        }
        if receipt.stored_id.is_some() {
            self.stored_id = receipt.stored_id;
        }
        if receipt.updated_at.is_some() {
            self.updated_at.clone_from(&receipt.updated_at);
        }
    }
}

/// Editor valuation levels with their stored scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationLevel {
    /// Stored as 25
    Deficient,
    /// Stored as 50
    BarelySatisfactory,
    /// Stored as 75
    NearlySatisfactory,
    /// Stored as 100
    Satisfactory,
}

impl ValuationLevel {
    /// All levels, lowest first
    pub const ALL: [Self; 4] = [
        Self::Deficient,
        Self::BarelySatisfactory,
        Self::NearlySatisfactory,
        Self::Satisfactory,
    ];

    /// Score written when this level is picked
    #[inline]
    #[must_use]
    pub fn score(self) -> i64 {
        match self {
            Self::Deficient => 25,
            Self::BarelySatisfactory => 50,
            Self::NearlySatisfactory => 75,
            Self::Satisfactory => 100,
        }
    }

    /// Level for a stored score; midpoints between level scores decide
    #[must_use]
    pub fn from_score(score: i64) -> Self {
        let score = score.clamp(0, 100);
        if score >= 88 {
            Self::Satisfactory
        } else if score >= 63 {
            Self::NearlySatisfactory
        } else if score >= 38 {
            Self::BarelySatisfactory
        } else {
            Self::Deficient
        }
    }

    /// Display label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Deficient => "Deficient",
            Self::BarelySatisfactory => "Barely satisfactory",
            Self::NearlySatisfactory => "Nearly satisfactory",
            Self::Satisfactory => "Satisfactory",
        }
    }
}

/// Partial update of one operational record
///
/// Only set fields are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    /// Presented flag
    #[serde(rename = "presenta", skip_serializing_if = "Option::is_none")]
    pub presents: Option<bool>,
    /// Valuation score
    #[serde(rename = "valoracion", skip_serializing_if = "Option::is_none")]
    pub valuation: Option<i64>,
    /// Responsible party
    #[serde(rename = "responsable", skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,
    /// Planned start
    #[serde(rename = "fecha_inicio", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Planned end
    #[serde(rename = "fecha_fin", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Progress percentage
    #[serde(rename = "avance_pct", skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<i64>,
}

impl RecordPatch {
    /// Create empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With presented flag
    #[inline]
    #[must_use]
    pub fn with_presents(mut self, presents: bool) -> Self {
        self.presents = Some(presents);
        self
    }

    /// With valuation level
    #[inline]
    #[must_use]
    pub fn with_level(mut self, level: ValuationLevel) -> Self {
        self.valuation = Some(level.score());
        self
    }

    /// With raw valuation score
    #[inline]
    #[must_use]
    pub fn with_valuation(mut self, valuation: i64) -> Self {
        self.valuation = Some(valuation);
        self
    }

    /// With responsible party
    #[inline]
    #[must_use]
    pub fn with_responsible(mut self, responsible: impl Into<String>) -> Self {
        self.responsible = Some(responsible.into());
        self
    }

    /// With planned dates
    #[inline]
    #[must_use]
    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// With progress percentage
    #[inline]
    #[must_use]
    pub fn with_progress(mut self, progress_pct: i64) -> Self {
        self.progress_pct = Some(progress_pct);
        self
    }

    /// Clamp scores, trim text, and check the date range
    ///
    /// # Errors
    /// `PlannerError::InvalidInput` if the end date precedes the start date
    pub fn normalized(mut self) -> Result<Self, PlannerError> {
        self.progress_pct = self.progress_pct.map(|p| p.clamp(0, 100));
        self.valuation = self.valuation.map(|v| v.clamp(0, 100));
        self.responsible = self.responsible.map(|r| r.trim().to_string());

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(PlannerError::InvalidInput(format!(
                    "end date {end} precedes start date {start}"
                )));
            }
        }
        Ok(self)
    }
}

/// Backend acknowledgement of a saved patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchReceipt {
    /// Stored row ID
    pub stored_id: Option<i64>,
    /// New update timestamp
    pub updated_at: Option<String>,
}

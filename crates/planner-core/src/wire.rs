//! Backend wire format
//!
//! The backend speaks Spanish field names and is inconsistent about a few of
//! them. Everything is decoded here, once, into the canonical types of
//! [`crate::types`]; nothing past this module looks at raw JSON.

use crate::error::PlannerError;
use crate::types::{
    Leaf, LeafId, LeafRecord, LeafSummary, OperationalRecord, PatchReceipt, PresenceCounts,
    Program, ProgramId, ProgressBands, RecordId, Tenant, TenantId,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct WireProgram {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default, alias = "name")]
    nombre: Option<String>,
}

impl WireProgram {
    /// `None` for entries without an id
    fn into_program(self) -> Option<Program> {
        let id = self.id?;
        Some(Program {
            id: ProgramId(id),
            name: self.nombre.unwrap_or_else(|| format!("Program {id}")),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireLeaf {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default, alias = "name")]
    nombre: Option<String>,
    #[serde(default, alias = "subprogramaId")]
    subprograma_id: Option<i64>,
}

impl WireLeaf {
    /// `None` for entries without an id
    fn into_leaf(self, parent: ProgramId) -> Option<Leaf> {
        let id = self.id?;
        Some(Leaf {
            id: LeafId(id),
            name: self.nombre.unwrap_or_else(|| format!("Leaf {id}")),
            parent_program_id: self.subprograma_id.map_or(parent, ProgramId),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireBands {
    #[serde(default, rename = "0_24")]
    band_0_24: u64,
    #[serde(default, rename = "25_49")]
    band_25_49: u64,
    #[serde(default, rename = "50_74")]
    band_50_74: u64,
    #[serde(default, rename = "75_100")]
    band_75_100: u64,
    #[serde(default, rename = "sin_dato")]
    no_data: u64,
    #[serde(default, rename = "mas_100")]
    over_100: u64,
}

impl From<WireBands> for ProgressBands {
    fn from(w: WireBands) -> Self {
        // Progress is clamped to 100 everywhere else, so the overflow band
        // belongs to the top one.
        Self {
            band_0_24: w.band_0_24,
            band_25_49: w.band_25_49,
            band_50_74: w.band_50_74,
            band_75_100: w.band_75_100 + w.over_100,
            no_data: w.no_data,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WirePresence {
    #[serde(default)]
    si: u64,
    #[serde(default)]
    no: u64,
    #[serde(default)]
    sin_dato: u64,
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(default)]
    responsable: Option<String>,
    #[serde(default)]
    valoracion: Option<f64>,
    #[serde(default)]
    avance_pct: Option<f64>,
    #[serde(default)]
    presenta: Option<bool>,
    #[serde(default)]
    fecha_inicio: Option<String>,
    #[serde(default)]
    fecha_fin: Option<String>,
    #[serde(default, alias = "updatedAt")]
    updated_at: Option<String>,
    #[serde(default)]
    titulo: Option<String>,
}

impl From<WireRecord> for LeafRecord {
    fn from(w: WireRecord) -> Self {
        Self {
            responsible: w.responsable.unwrap_or_default(),
            valuation: w.valoracion,
            progress_pct: w.avance_pct,
            presents: w.presenta,
            start_date: w.fecha_inicio,
            end_date: w.fecha_fin,
            updated_at: w.updated_at,
            title: w.titulo,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSummary {
    #[serde(default, alias = "total_evidencias")]
    evidencias_total: Option<u64>,
    #[serde(default)]
    avance_promedio: Option<f64>,
    #[serde(default)]
    valoracion_promedio: Option<f64>,
    #[serde(default)]
    fecha_inicio_min: Option<String>,
    #[serde(default)]
    fecha_fin_max: Option<String>,
    #[serde(default)]
    meses_para_finalizar: Option<i64>,
    #[serde(default)]
    avance_rangos: Option<WireBands>,
    #[serde(default)]
    presenta: Option<WirePresence>,
    #[serde(default)]
    registros: Option<Vec<WireRecord>>,
}

impl From<WireSummary> for LeafSummary {
    fn from(w: WireSummary) -> Self {
        let records: Vec<LeafRecord> = w
            .registros
            .unwrap_or_default()
            .into_iter()
            .map(LeafRecord::from)
            .collect();
        let presence = w.presenta.unwrap_or_default();
        Self {
            total_evidence_count: w.evidencias_total.unwrap_or(records.len() as u64),
            average_progress: w.avance_promedio,
            average_valuation: w.valoracion_promedio,
            min_start_date: w.fecha_inicio_min,
            max_end_date: w.fecha_fin_max,
            months_to_finish: w.meses_para_finalizar,
            progress_bands: w.avance_rangos.unwrap_or_default().into(),
            presence: PresenceCounts {
                yes: presence.si,
                no: presence.no,
                no_data: presence.sin_dato,
            },
            records,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireTenant {
    id: i64,
    #[serde(default, alias = "name")]
    nombre: Option<String>,
    #[serde(default)]
    slug: Option<String>,
}

impl From<WireTenant> for Tenant {
    fn from(w: WireTenant) -> Self {
        let slug = w.slug.unwrap_or_default();
        Self {
            id: TenantId(w.id),
            name: w.nombre.unwrap_or_else(|| slug.clone()),
            slug,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireOperationalRecord {
    #[serde(alias = "evidenciaId")]
    evidencia_id: i64,
    #[serde(default)]
    registro_id: Option<i64>,
    #[serde(default)]
    orden: Option<i64>,
    #[serde(default)]
    titulo: Option<String>,
    #[serde(default)]
    presenta: Option<bool>,
    #[serde(default)]
    valoracion: Option<i64>,
    #[serde(default)]
    responsable: Option<String>,
    #[serde(default)]
    fecha_inicio: Option<NaiveDate>,
    #[serde(default)]
    fecha_fin: Option<NaiveDate>,
    #[serde(default)]
    avance_pct: Option<i64>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl From<WireOperationalRecord> for OperationalRecord {
    fn from(w: WireOperationalRecord) -> Self {
        Self {
            id: RecordId(w.evidencia_id),
            stored_id: w.registro_id,
            order: w.orden.unwrap_or_default(),
            title: w.titulo.unwrap_or_default(),
            presents: w.presenta.unwrap_or(false),
            valuation: w.valoracion.unwrap_or(0),
            responsible: w.responsable.filter(|r| !r.trim().is_empty()),
            start_date: w.fecha_inicio,
            end_date: w.fecha_fin,
            progress_pct: w.avance_pct.unwrap_or(0),
            updated_at: w.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireRecordList {
    Bare(Vec<WireOperationalRecord>),
    Wrapped {
        #[serde(default)]
        items: Vec<WireOperationalRecord>,
    },
}

#[derive(Debug, Deserialize)]
struct WirePatchReceipt {
    #[serde(default)]
    registro_id: Option<i64>,
    #[serde(default)]
    updated_at: Option<String>,
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, PlannerError> {
    serde_json::from_str(body).map_err(|e| PlannerError::Decode(e.to_string()))
}

/// Decode the program list; `null` decodes as empty
///
/// Entries without an `id` are skipped.
///
/// # Errors
/// `PlannerError::Decode` on malformed JSON
pub fn parse_programs(body: &str) -> Result<Vec<Program>, PlannerError> {
    let list: Option<Vec<WireProgram>> = decode(body)?;
    Ok(list
        .unwrap_or_default()
        .into_iter()
        .filter_map(WireProgram::into_program)
        .collect())
}

/// Decode the leaf list of `parent`; `null` decodes as empty
///
/// Entries without an `id` are skipped.
///
/// # Errors
/// `PlannerError::Decode` on malformed JSON
pub fn parse_leaves(body: &str, parent: ProgramId) -> Result<Vec<Leaf>, PlannerError> {
    let list: Option<Vec<WireLeaf>> = decode(body)?;
    Ok(list
        .unwrap_or_default()
        .into_iter()
        .filter_map(|w| w.into_leaf(parent))
        .collect())
}

/// Decode one leaf summary
///
/// # Errors
/// `PlannerError::Decode` on malformed JSON
pub fn parse_leaf_summary(body: &str) -> Result<LeafSummary, PlannerError> {
    decode::<WireSummary>(body).map(LeafSummary::from)
}

/// Decode the tenant directory
///
/// # Errors
/// `PlannerError::Decode` on malformed JSON
pub fn parse_tenants(body: &str) -> Result<Vec<Tenant>, PlannerError> {
    let list: Option<Vec<WireTenant>> = decode(body)?;
    Ok(list.unwrap_or_default().into_iter().map(Tenant::from).collect())
}

/// Decode operational records, bare or wrapped in `{ "items": [...] }`
///
/// # Errors
/// `PlannerError::Decode` on malformed JSON
pub fn parse_operational_records(body: &str) -> Result<Vec<OperationalRecord>, PlannerError> {
    let list = match decode::<Option<WireRecordList>>(body)? {
        Some(WireRecordList::Bare(items) | WireRecordList::Wrapped { items }) => items,
        None => Vec::new(),
    };
    Ok(list.into_iter().map(OperationalRecord::from).collect())
}

/// Decode the acknowledgement of a record patch
///
/// # Errors
/// `PlannerError::Decode` on malformed JSON
pub fn parse_patch_receipt(body: &str) -> Result<PatchReceipt, PlannerError> {
    let w: WirePatchReceipt = decode(body)?;
    Ok(PatchReceipt {
        stored_id: w.registro_id,
        updated_at: w.updated_at,
    })
}

/// Pull the `detail` or `message` field out of an error body
///
/// Falls back to the raw text, then to `HTTP <status>`.
#[must_use]
pub fn error_detail(status: u16, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message"] {
            match map.get(key) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(v) if !v.is_null() && !v.is_string() => return v.to_string(),
                _ => {}
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}

//! Plain-text rendering of dashboard views

use planner_core::aggregate::PLACEHOLDER;
use planner_core::{
    AggregateView, LeafDetail, Notice, OperationalRecord, RowStatus, Severity, Tenant,
};
use std::fmt::Write;

fn or_placeholder<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), |v| v.to_string())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// One notice per line, tagged with its severity
pub(crate) fn notice_line(notice: &Notice) -> String {
    let tag = match notice.severity() {
        Severity::Info => "info",
        Severity::Success => "ok",
        Severity::Warning => "warning",
        Severity::Danger => "error",
    };
    format!("[{tag}] {notice}")
}

pub(crate) fn summary_table(view: &AggregateView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:<32} {:<20} {:<10} {:>8} {:>9}  ",
        "Program", "Leaf", "Responsible", "Updated", "Progress", "Evidence"
    );
    for row in &view.rows {
        let marker = match &row.status {
            RowStatus::Ok => String::new(),
            RowStatus::Degraded { notice } => format!("! {}", notice.message()),
        };
        let _ = writeln!(
            out,
            "{:<24} {:<32} {:<20} {:<10} {:>8} {:>9}  {}",
            truncate(&row.program_name, 24),
            truncate(&row.leaf_name, 32),
            truncate(row.responsible_label(), 20),
            row.last_updated_label(),
            row.progress_label(),
            row.evidence_count,
            marker
        );
    }

    let totals = view.totals;
    let _ = writeln!(
        out,
        "\n{} leaves, {} degraded, {} evidence items",
        totals.leaves, totals.degraded, totals.evidence
    );
    let b = view.progress_bands;
    let _ = writeln!(
        out,
        "Progress bands: 0-24 {} | 25-49 {} | 50-74 {} | 75-100 {} | no data {}",
        b.band_0_24, b.band_25_49, b.band_50_74, b.band_75_100, b.no_data
    );
    if let Some(latest) = view.last_updated_overall {
        let _ = writeln!(out, "Last update: {}", latest.date_naive());
    }
    out
}

pub(crate) fn leaf_detail(detail: &LeafDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Evidence:         {}", detail.evidence_count);
    let _ = writeln!(out, "Average progress: {:.0}%", detail.average_progress.round());
    let _ = writeln!(
        out,
        "Average rating:   {}",
        or_placeholder(detail.average_valuation.map(|v| format!("{v:.1}")))
    );
    let _ = writeln!(out, "Planned start:    {}", or_placeholder(detail.min_start_date));
    let _ = writeln!(out, "Planned end:      {}", or_placeholder(detail.max_end_date));
    if let Some(months) = detail.months_to_finish {
        let _ = writeln!(out, "Months to finish: {months}");
    }
    let _ = writeln!(
        out,
        "Responsible:      {}",
        or_placeholder(detail.responsible.as_deref())
    );

    let p = detail.presence;
    let _ = writeln!(out, "\nPresented: yes {} | no {} | no data {}", p.yes, p.no, p.no_data);
    let v = detail.valuation_buckets;
    let _ = writeln!(
        out,
        "Rating:    deficient {} | barely {} | nearly {} | satisfactory {} | no data {}",
        v.deficient, v.barely_satisfactory, v.nearly_satisfactory, v.satisfactory, v.no_data
    );
    let b = detail.progress_bands;
    let _ = writeln!(
        out,
        "Progress:  0-24 {} | 25-49 {} | 50-74 {} | 75-100 {} | no data {}",
        b.band_0_24, b.band_25_49, b.band_50_74, b.band_75_100, b.no_data
    );
    out
}

pub(crate) fn records_table(records: &[OperationalRecord]) -> String {
    if records.is_empty() {
        return "No evidence items for this leaf.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6} {:>5} {:<36} {:<9} {:<21} {:<20} {:>8}",
        "ID", "Order", "Evidence", "Presented", "Rating", "Responsible", "Progress"
    );
    for r in records {
        let _ = writeln!(
            out,
            "{:>6} {:>5} {:<36} {:<9} {:<21} {:<20} {:>7}%",
            r.id,
            r.order,
            truncate(&r.title, 36),
            if r.presents { "yes" } else { "no" },
            r.valuation_level().label(),
            truncate(r.responsible.as_deref().unwrap_or(PLACEHOLDER), 20),
            r.progress_pct
        );
    }
    out
}

pub(crate) fn tenants_table(tenants: &[Tenant]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>6} {:<20} {}", "ID", "Slug", "Name");
    for t in tenants {
        let _ = writeln!(out, "{:>6} {:<20} {}", t.id, t.slug, t.name);
    }
    out
}

//! Completeness, consistency and accuracy over the parsed rows

use std::collections::{BTreeMap, HashSet};

use crate::{ColumnKind, DatasetRecord, ParsedDataset, QualityDetails, QualityMetrics};

/// Positional layout the metrics assume: id, name, category, value, score.
pub const EXPECTED_FIELDS: usize = 5;

const COL_ID: usize = 0;
const COL_CATEGORY: usize = 2;
const COL_VALUE: usize = 3;
const COL_SCORE: usize = 4;

const COLUMN_KINDS: [(&str, ColumnKind); EXPECTED_FIELDS] = [
    ("id", ColumnKind::Numeric),
    ("name", ColumnKind::String),
    ("category", ColumnKind::Categorical),
    ("value", ColumnKind::Numeric),
    ("score", ColumnKind::Numeric),
];

/// Declared column kinds. Static metadata, not inferred from the data.
pub fn inferred_types() -> BTreeMap<String, ColumnKind> {
    COLUMN_KINDS.iter().map(|(name, kind)| (name.to_string(), *kind)).collect()
}

/// Computed even when the schema is invalid; only meaningful when it is valid.
pub fn assess(ds: &ParsedDataset) -> QualityMetrics {
    let rows = &ds.records;
    let total_rows = rows.len() as u64;

    let completeness = completeness(rows);
    let consistency = percent(rows.iter().filter(|r| is_consistent(r)).count() as u64, total_rows);
    let complete_rows = rows.iter().filter(|r| all_filled(r)).count() as u64;
    let accuracy = percent(
        rows.iter().filter(|r| r.field_count() == EXPECTED_FIELDS && all_filled(r)).count() as u64,
        total_rows,
    );

    let sum = completeness as f64 + consistency as f64 + accuracy as f64;
    let score = (sum / 3.0).round().clamp(0.0, 100.0) as u8;

    let categories: HashSet<&str> = rows
        .iter()
        .filter_map(|r| r.field(COL_CATEGORY))
        .filter(|c| !c.is_empty())
        .collect();

    QualityMetrics {
        completeness,
        consistency,
        accuracy,
        score,
        details: QualityDetails {
            total_rows,
            complete_rows,
            unique_category_count: categories.len() as u64,
            inferred_types: inferred_types(),
        },
    }
}

fn completeness(rows: &[DatasetRecord]) -> u8 {
    let total_cells = rows.len() as u64 * EXPECTED_FIELDS as u64;
    let empty_cells: u64 = rows
        .iter()
        .map(|r| r.fields().iter().filter(|f| f.trim().is_empty()).count() as u64)
        .sum();
    // rows wider than five fields can push empty_cells past total_cells
    percent(total_cells.saturating_sub(empty_cells), total_cells)
}

fn is_consistent(r: &DatasetRecord) -> bool {
    if r.field_count() != EXPECTED_FIELDS {
        return false;
    }
    let id_ok = r.field(COL_ID).map(|v| v.trim().parse::<i64>().is_ok()).unwrap_or(false);
    id_ok && is_float(r.field(COL_VALUE)) && is_float(r.field(COL_SCORE))
}

fn is_float(v: Option<&str>) -> bool {
    v.and_then(|v| v.trim().parse::<f64>().ok())
        .map(f64::is_finite)
        .unwrap_or(false)
}

fn all_filled(r: &DatasetRecord) -> bool {
    r.fields().iter().all(|f| !f.trim().is_empty())
}

/// Rounded percentage; zero when `whole` is zero.
fn percent(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round().clamp(0.0, 100.0) as u8
}

//! Structural conformance of the header and rows

use crate::{Check, ParsedDataset, SchemaReport};

/// Columns every dataset must carry, matched case-insensitively as substrings
/// of header fields (`"identifier"` satisfies `"id"`).
pub const REQUIRED_COLUMNS: [&str; 5] = ["id", "name", "category", "value", "score"];

pub const CHECK_HAS_HEADERS: &str = "Has headers";
pub const CHECK_REQUIRED_COLUMNS: &str = "Required columns";
pub const CHECK_CONSISTENT_FORMAT: &str = "Consistent format";

pub fn validate(ds: &ParsedDataset) -> SchemaReport {
    let has_headers = !ds.header.is_empty();
    let has_required = missing_columns(&ds.header).is_empty();
    let width = ds.header.len();
    let consistent = ds.records.iter().all(|r| r.field_count() == width);

    let checks = vec![
        Check::new(CHECK_HAS_HEADERS, has_headers),
        Check::new(CHECK_REQUIRED_COLUMNS, has_required),
        Check::new(CHECK_CONSISTENT_FORMAT, consistent),
    ];
    let valid = checks.iter().all(|c| c.passed);

    SchemaReport {
        valid,
        header_fields: ds.header.clone(),
        row_count: ds.row_count() as u64,
        checks,
    }
}

/// Required columns with no header field containing them.
pub fn missing_columns(header: &[String]) -> Vec<&'static str> {
    let lowered: Vec<String> = header.iter().map(|h| h.to_lowercase()).collect();
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !lowered.iter().any(|h| h.contains(col)))
        .collect()
}

use crate::{IntegrityReport, QualityMetrics, SchemaReport, ValidationStatus};

/// Minimum quality score for a fully verified dataset.
pub const VERIFIED_THRESHOLD: u8 = 70;

pub fn determine(integrity: &IntegrityReport, schema: &SchemaReport, quality: &QualityMetrics) -> ValidationStatus {
    from_parts(integrity.valid_digest, schema.valid, quality.score)
}

pub fn from_parts(valid_digest: bool, schema_valid: bool, score: u8) -> ValidationStatus {
    match (valid_digest && schema_valid, score >= VERIFIED_THRESHOLD) {
        (true, true) => ValidationStatus::Verified,
        (true, false) => ValidationStatus::PartiallyVerified,
        (false, _) => ValidationStatus::Failed,
    }
}

//! Dataset validation and attestation
//!
//! Turns raw dataset bytes into integrity, schema and quality reports, derives an
//! overall verdict and packs everything into an Ed25519-signed attestation document.

mod error;
mod types;
pub mod dataset;
pub mod integrity;
pub mod schema;
pub mod quality;
pub mod status;
pub mod attestation;
pub mod signer;
pub mod fixtures;

pub use error::{AttestError, VerifyError};
pub use types::{Check, ColumnKind, IntegrityReport, QualityDetails, QualityMetrics, SchemaReport, TokenId, ValidationStatus};
pub use dataset::{DatasetRecord, ParsedDataset};
pub use attestation::{Attestation, AttestationBuilder, ValidationReports, ATTESTATION_VERSION};
pub use signer::{verify, ValidatorKey};
pub use status::VERIFIED_THRESHOLD;

/// Reports and verdict for one dataset, before it is attested.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationOutcome {
    pub reports: ValidationReports,
    pub status: ValidationStatus,
}

/// Run the integrity, schema and quality checks over one parse of `bytes`.
///
/// Malformed content never errors: every anomaly ends up as a failed check.
pub fn validate_bytes(bytes: &[u8]) -> ValidationOutcome {
    let integrity = integrity::check(bytes);
    let parsed = dataset::parse(bytes);
    let schema = schema::validate(&parsed);
    let quality = quality::assess(&parsed);
    let status = status::determine(&integrity, &schema, &quality);

    ValidationOutcome {
        reports: ValidationReports { integrity, schema, quality },
        status,
    }
}

use serde::{Deserialize, Serialize};

pub const MAX_ERROR_SAMPLES: usize = 5;

/// Counters for one migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub processed: u64,
    pub updated: u64,
    /// Updates that carried markup extracted from builder items.
    pub normalized: u64,
    pub skipped_no_meta: u64,
    pub invalid_base64: u64,
    pub skipped_unrecognized: u64,
    pub skipped_existing: u64,
    pub errors: u64,
    pub error_samples: Vec<String>,
}

/// What happened to a single record.
#[derive(Debug)]
pub enum RecordOutcome {
    /// Content replaced with a non-empty document.
    Updated,
    /// Builder data parsed but held no items; content replaced with `""`.
    UpdatedEmpty,
    NoData,
    KeptExisting,
    InvalidEncoding,
    Unrecognized(String),
    Failed(crate::Error),
}

impl RecordOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::UpdatedEmpty => "updated (empty)",
            Self::NoData => "no data",
            Self::KeptExisting => "kept existing content",
            Self::InvalidEncoding => "invalid base64",
            Self::Unrecognized(_) => "unrecognized structure",
            Self::Failed(_) => "failed",
        }
    }
}

impl MigrationResult {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        self.processed += 1;
        match outcome {
            RecordOutcome::Updated => {
                self.updated += 1;
                self.normalized += 1;
            }
            RecordOutcome::UpdatedEmpty => self.updated += 1,
            RecordOutcome::NoData => self.skipped_no_meta += 1,
            RecordOutcome::KeptExisting => self.skipped_existing += 1,
            RecordOutcome::InvalidEncoding => self.invalid_base64 += 1,
            RecordOutcome::Unrecognized(_) => self.skipped_unrecognized += 1,
            RecordOutcome::Failed(error) => self.record_error(error),
        }
    }

    /// Count an error, keeping its message while fewer than
    /// [`MAX_ERROR_SAMPLES`] are stored.
    pub fn record_error(&mut self, error: &crate::Error) {
        self.errors += 1;
        if self.error_samples.len() < MAX_ERROR_SAMPLES {
            self.error_samples.push(error.to_string());
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Operator-facing summary of a run.
pub fn render_summary(result: &MigrationResult) -> String {
    let mut lines = vec![
        "Migration complete.".to_owned(),
        format!("  Processed records: {}", result.processed),
        format!("  Updated records: {}", result.updated),
        format!("  Normalized from serialized data: {}", result.normalized),
        format!("  Skipped (no data): {}", result.skipped_no_meta),
        format!("  Skipped (invalid base64): {}", result.invalid_base64),
        format!(
            "  Skipped (unrecognized structure): {}",
            result.skipped_unrecognized
        ),
        format!("  Skipped (existing content): {}", result.skipped_existing),
        format!("  Errors: {}", result.errors),
    ];
    if !result.error_samples.is_empty() {
        lines.push("Sample errors:".to_owned());
        lines.extend(result.error_samples.iter().map(|s| format!("  - {s}")));
    }
    lines.join("\n")
}

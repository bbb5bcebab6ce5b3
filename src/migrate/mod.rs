//! Batch migration of every record that carries builder data.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use futures::StreamExt as _;
use tracing::{debug, error, info, warn};

mod result;

pub use result::{MAX_ERROR_SAMPLES, MigrationResult, RecordOutcome, render_summary};

use crate::{
    ErrorContext, ErrorDetail,
    config::MigrationConfig,
    normalize::{DocumentEngine, Normalizer, decode},
    progress::{MigrationPhase, NullReporter, ProgressReporter, RecordStatus},
    store::{RecordId, RecordQuery, RecordSink, RecordSource},
};

/// How long the last result stays readable through a result channel.
pub const RESULT_TTL_SECS: u64 = 60;

pub struct MigrationDriver<S, K, N = Normalizer> {
    source: S,
    sink: K,
    normalizer: N,
    config: MigrationConfig,
    reporter: Arc<dyn ProgressReporter>,
}

impl<S: RecordSource, K: RecordSink> MigrationDriver<S, K> {
    pub fn new(source: S, sink: K, config: MigrationConfig) -> Self {
        Self {
            source,
            sink,
            normalizer: Normalizer::default(),
            config,
            reporter: Arc::new(NullReporter),
        }
    }
}

impl<S: RecordSource, K: RecordSink, N: DocumentEngine> MigrationDriver<S, K, N> {
    pub fn with_normalizer<M: DocumentEngine>(self, normalizer: M) -> MigrationDriver<S, K, M> {
        MigrationDriver {
            source: self.source,
            sink: self.sink,
            normalizer,
            config: self.config,
            reporter: self.reporter,
        }
    }

    pub fn with_reporter(self, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { reporter, ..self }
    }

    /// Migrate every matching record, page by page.
    ///
    /// Per-record failures are counted and never stop the run. A page that
    /// cannot be listed is recorded as an error and ends the run early.
    pub async fn run(&self) -> MigrationResult {
        let mut result = MigrationResult::default();
        let query = RecordQuery {
            post_types: &self.config.post_types,
            meta_key: &self.config.meta_key,
        };
        let per_page = self.config.page_size;
        let mut page = 1u32;
        loop {
            self.reporter
                .set_phase(MigrationPhase::ListingRecords { page });
            let context = ErrorContext::new(page);
            let listed = match self.source.list_ids(&query, page, per_page).await {
                Ok(listed) => listed,
                Err(e) => {
                    error!(page, error = %e, "failed to list records");
                    let e = context.error(ErrorDetail::List(Box::new(e)));
                    self.reporter.log_error(&e.to_string());
                    result.record_error(&e);
                    break;
                }
            };
            if page == 1 {
                info!(total = listed.total, "found records with builder data");
                self.reporter.register_total(listed.total);
            }
            self.reporter.set_phase(MigrationPhase::MigratingRecords);

            let context = &context;
            let mut outcomes = futures::stream::iter(listed.ids.iter().copied())
                .map(|id| async move { (id, self.process_record(context, id).await) })
                .buffered(self.config.concurrency.max(1));
            while let Some((id, outcome)) = outcomes.next().await {
                self.reporter.update_record(id, status_of(&outcome));
                result.record(&outcome);
            }

            page += 1;
            let seen = u64::from(page - 1) * u64::from(per_page);
            if listed.ids.is_empty() || seen >= listed.total {
                break;
            }
        }
        info!(
            processed = result.processed,
            updated = result.updated,
            errors = result.errors,
            "migration finished"
        );
        result
    }

    async fn process_record(&self, context: &ErrorContext, id: RecordId) -> RecordOutcome {
        self.reporter.update_record(id, RecordStatus::Processing);

        let blob = match self.source.marker(id, &self.config.meta_key).await {
            Ok(Some(blob)) if !blob.is_empty() => blob,
            Ok(_) => return RecordOutcome::NoData,
            Err(e) => {
                return RecordOutcome::Failed(
                    context.with_id(id).error(ErrorDetail::Read(Box::new(e))),
                );
            }
        };

        // Checked before decoding so kept records cost no parsing at all.
        if !self.config.overwrite_nonempty {
            match self.source.content(id).await {
                Ok(Some(current)) if !current.is_empty() => {
                    debug!(id, "keeping existing content");
                    return RecordOutcome::KeptExisting;
                }
                Ok(_) => {}
                Err(e) => {
                    return RecordOutcome::Failed(
                        context.with_id(id).error(ErrorDetail::Read(Box::new(e))),
                    );
                }
            }
        }

        let bytes = match decode::decode(&blob) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(id, error = %e, "invalid builder data encoding");
                return RecordOutcome::InvalidEncoding;
            }
        };

        let normalized = catch_unwind(AssertUnwindSafe(|| {
            self.normalizer.normalize_decoded(&bytes)
        }));
        let document = match normalized {
            Ok(Ok(document)) => document,
            Ok(Err(reason)) => {
                debug!(id, %reason, "unrecognized builder data");
                return RecordOutcome::Unrecognized(reason.to_string());
            }
            Err(_) => {
                warn!(id, "normalization panicked");
                self.reporter
                    .log_warn(&format!("Record ID {id}: normalization panicked"));
                return RecordOutcome::Unrecognized("normalization panicked".to_owned());
            }
        };

        match self.sink.update_content(id, &document).await {
            Ok(()) if document.is_empty() => RecordOutcome::UpdatedEmpty,
            Ok(()) => RecordOutcome::Updated,
            Err(e) => {
                warn!(id, error = %e, "failed to update record");
                RecordOutcome::Failed(context.with_id(id).error(ErrorDetail::Update(Box::new(e))))
            }
        }
    }
}

fn status_of(outcome: &RecordOutcome) -> RecordStatus {
    match outcome {
        RecordOutcome::Updated | RecordOutcome::UpdatedEmpty => RecordStatus::Migrated,
        RecordOutcome::Failed(e) => RecordStatus::Failed(e.to_string()),
        other => RecordStatus::Skipped(other.label()),
    }
}

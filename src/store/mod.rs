//! Record storage seen by the migration driver.
//!
//! The normalization engine never touches these traits; only
//! [`crate::migrate::MigrationDriver`] does.

use crate::migrate::MigrationResult;

pub mod sqlite;

pub type RecordId = i64;

/// Selection of records carrying the legacy marker field.
#[derive(Debug, Clone, Copy)]
pub struct RecordQuery<'a> {
    pub post_types: &'a [String],
    pub meta_key: &'a str,
}

/// One page of matching record IDs plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdPage {
    pub ids: Vec<RecordId>,
    pub total: u64,
}

pub trait RecordSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// IDs of matching records of any status, ascending, for a 1-based page.
    fn list_ids(
        &self,
        query: &RecordQuery<'_>,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<IdPage, Self::Error>>;

    fn marker(
        &self,
        id: RecordId,
        meta_key: &str,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>>;

    fn content(&self, id: RecordId) -> impl Future<Output = Result<Option<String>, Self::Error>>;
}

pub trait RecordSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn update_content(
        &self,
        id: RecordId,
        content: &str,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Short-lived hand-off of the last run's result to whoever displays it.
pub trait ResultChannel {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Replace any stored result; it expires after `ttl_secs`.
    fn put_result(
        &self,
        result: &MigrationResult,
        ttl_secs: u64,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Read and delete the stored result. Expired results read as `None`.
    fn take_result(&self) -> impl Future<Output = Result<Option<MigrationResult>, Self::Error>>;
}

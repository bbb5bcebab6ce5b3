use crate::store::RecordId;

pub mod config;
pub mod migrate;
pub mod normalize;
pub mod progress;
pub mod sanitize;
pub mod store;

#[cfg(test)]
mod tests;

pub use migrate::{MigrationDriver, MigrationResult, RecordOutcome, render_summary};
pub use normalize::{DocumentEngine, NormalizeError, Normalizer, normalize};
pub use sanitize::{AllowList, Sanitizer};

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[error("{context}: {detail}")]
pub struct Error {
    pub context: Box<ErrorContext>,
    pub detail: Box<ErrorDetail>,
}

/// Where in a run an error happened: the page being listed, and the record
/// once one is being processed.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub page: u32,
    pub id: Option<RecordId>,
}

impl ErrorContext {
    pub(crate) fn new(page: u32) -> Self {
        Self { page, id: None }
    }

    pub(crate) fn with_id(&self, id: RecordId) -> Self {
        Self {
            page: self.page,
            id: Some(id),
        }
    }

    pub(crate) fn error(&self, detail: ErrorDetail) -> Error {
        Error {
            context: Box::new(self.clone()),
            detail: Box::new(detail),
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "Record ID {id}"),
            None => write!(f, "Page {}", self.page),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorDetail {
    #[error("Failed to list records: {0}")]
    List(BoxedError),
    #[error("Failed to read record: {0}")]
    Read(BoxedError),
    #[error("Failed to update record: {0}")]
    Update(BoxedError),
}

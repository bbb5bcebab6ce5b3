//! Conversion of a legacy builder blob into sanitized markup.
//!
//! The pipeline is decode, deserialize, walk (extracting fragments from
//! items), assemble and sanitize. It holds no state between calls and does
//! no I/O.

use tracing::debug;

pub mod assemble;
pub mod decode;
pub mod deserialize;
pub mod extract;
pub mod tree;
pub mod walk;

pub use decode::InvalidEncoding;
pub use deserialize::Unrecognized;
pub use extract::Fragment;
pub use tree::{ItemNode, Scalar, TreeNode};

use crate::sanitize::Sanitizer;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error(transparent)]
    InvalidEncoding(#[from] InvalidEncoding),
    #[error("unrecognized builder data: {0}")]
    Unrecognized(#[from] Unrecognized),
}

/// Turns decoded builder data into a document. The migration driver runs
/// one of these per record.
pub trait DocumentEngine {
    fn normalize_decoded(&self, bytes: &[u8]) -> Result<String, Unrecognized>;
}

#[derive(Default)]
pub struct Normalizer {
    sanitizer: Sanitizer,
}

impl Normalizer {
    pub fn new(sanitizer: Sanitizer) -> Self {
        Self { sanitizer }
    }

    /// Normalize an already decoded payload.
    ///
    /// `Ok("")` means the data parsed but held no extractable items.
    pub fn normalize_decoded(&self, bytes: &[u8]) -> Result<String, Unrecognized> {
        let tree = deserialize::deserialize(bytes)?;
        let fragments = walk::walk(&tree)?;
        if fragments.is_empty() {
            return Ok(String::new());
        }
        debug!(fragments = fragments.len(), "extracted builder fragments");
        Ok(self.sanitizer.sanitize(&assemble::assemble(&fragments)))
    }

    pub fn normalize(&self, blob: &str) -> Result<String, NormalizeError> {
        let bytes = decode::decode(blob)?;
        Ok(self.normalize_decoded(&bytes)?)
    }
}

impl DocumentEngine for Normalizer {
    fn normalize_decoded(&self, bytes: &[u8]) -> Result<String, Unrecognized> {
        Normalizer::normalize_decoded(self, bytes)
    }
}

/// Normalize a blob with the default rich-content allow-list.
pub fn normalize(blob: &str) -> Result<String, NormalizeError> {
    Normalizer::default().normalize(blob)
}

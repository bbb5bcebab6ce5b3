use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_META_KEY: &str = "mfn-page-items";
pub const DEFAULT_PAGE_SIZE: u32 = 200;
pub const DEFAULT_POST_TYPES: [&str; 5] = ["page", "post", "template", "portfolio", "product"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read {
        path: String,
        error: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Record types whose builder data is migrated.
    pub post_types: Vec<String>,
    /// Replace content that is already non-empty.
    pub overwrite_nonempty: bool,
    pub page_size: u32,
    /// Name of the field holding the encoded builder data.
    pub meta_key: String,
    /// Records normalized at once within a page.
    pub concurrency: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            post_types: DEFAULT_POST_TYPES.map(String::from).to_vec(),
            overwrite_nonempty: true,
            page_size: DEFAULT_PAGE_SIZE,
            meta_key: DEFAULT_META_KEY.to_owned(),
            concurrency: 1,
        }
    }
}

impl MigrationConfig {
    pub fn from_yaml(src: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = tokio::fs::read_to_string(path)
            .await
            .map_err(|error| ConfigError::Read {
                path: path.display().to_string(),
                error,
            })?;
        Self::from_yaml(&src)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.post_types.is_empty() {
            return Err(ConfigError::Invalid("post_types must not be empty"));
        }
        if self.post_types.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid("post_types must not contain blank names"));
        }
        if self.meta_key.is_empty() {
            return Err(ConfigError::Invalid("meta_key must not be empty"));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be positive"));
        }
        Ok(())
    }
}

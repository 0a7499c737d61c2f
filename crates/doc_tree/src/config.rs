//! Tree configuration

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Behavioural switches of a [`Presentation`](crate::Presentation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Let childless `img`, `video` and `math` elements contribute their
    /// `alt`/`alttext` attribute, and any childless element its `title`,
    /// to the flattened text.
    pub accept_image_alt_text: bool,
    /// Compare the incremental text cache against a full recomputation
    /// after every mutation (debug builds only).
    pub verify_text_cache: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            accept_image_alt_text: true,
            verify_text_cache: false,
        }
    }
}

impl TreeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults. A file that exists but does not
    /// parse is logged and also yields the defaults; only I/O errors while
    /// reading an existing file are reported.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<TreeConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse tree config {}, using defaults: {}",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Write configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Whether switching from `self` to `other` changes which nodes carry text
    pub(crate) fn text_policy_differs(&self, other: &TreeConfig) -> bool {
        self.accept_image_alt_text != other.accept_image_alt_text
    }
}

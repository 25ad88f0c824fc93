//! Engine configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ViewError;

/// Settings for view resolution and rendering
///
/// All fields have defaults, so a config file only needs to override what
/// differs from the stock layout:
///
/// ```yaml
/// root: templates
/// decorated-extension: .tpl.html
/// plain-extension: .html
/// include-depth: 32
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// Directory searched for template files
    pub root: PathBuf,

    /// Extension of decorated-dialect templates (checked first)
    #[serde(rename = "decorated-extension")]
    pub decorated_extension: String,

    /// Extension of plain-dialect templates
    #[serde(rename = "plain-extension")]
    pub plain_extension: String,

    /// Maximum depth of `{% include %}` chains before rendering fails
    #[serde(rename = "include-depth")]
    pub include_depth: usize,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("views"),
            decorated_extension: ".tpl.html".to_string(),
            plain_extension: ".html".to_string(),
            include_depth: 32,
        }
    }
}

impl ViewsConfig {
    /// Default settings with the given views root
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ViewError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ViewError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|source| ViewError::Config {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        info!(path = %path.display(), "Loaded views config");
        Ok(config)
    }

    /// Validate settings before use
    ///
    /// Call this early so a misconfigured engine fails at construction
    /// instead of on the first render.
    pub fn validate(&self) -> Result<(), ViewError> {
        for (label, ext) in [
            ("decorated-extension", &self.decorated_extension),
            ("plain-extension", &self.plain_extension),
        ] {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(ViewError::InvalidConfig {
                    reason: format!("{label} must start with '.' and name an extension, got '{ext}'"),
                });
            }
        }

        if self.decorated_extension == self.plain_extension {
            return Err(ViewError::InvalidConfig {
                reason: "decorated-extension and plain-extension must differ".to_string(),
            });
        }

        if self.include_depth == 0 {
            return Err(ViewError::InvalidConfig {
                reason: "include-depth must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

//! View name resolution
//!
//! Maps dotted view names to template files under the configured root.
//! `admin.users.index` becomes `<root>/admin/users/index` plus one of the
//! two dialect extensions, decorated checked first. Names are validated
//! before they touch the filesystem, so a name can never escape the root.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::ViewsConfig;
use crate::error::ViewError;
use crate::template::Dialect;

/// A resolved template file and the dialect it is compiled under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub dialect: Dialect,
}

/// Resolves dotted view names to template files
#[derive(Debug, Clone)]
pub struct ViewResolver {
    root: PathBuf,
    decorated_extension: String,
    plain_extension: String,
}

impl ViewResolver {
    pub fn new(config: &ViewsConfig) -> Self {
        Self {
            root: config.root.clone(),
            decorated_extension: config.decorated_extension.clone(),
            plain_extension: config.plain_extension.clone(),
        }
    }

    /// The views root this resolver searches
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the template file for `name`
    ///
    /// Probes the decorated extension first, then the plain one. A name
    /// with no file behind it reports both candidate paths.
    pub fn resolve(&self, name: &str) -> Result<Location, ViewError> {
        validate_name(name)?;
        let mut searched = Vec::with_capacity(2);
        for (extension, dialect) in [
            (self.decorated_extension.as_str(), Dialect::Decorated),
            (self.plain_extension.as_str(), Dialect::Plain),
        ] {
            let path = self.candidate(name, extension);
            if path.is_file() {
                debug!(view = name, path = ?path, ?dialect, "resolved view");
                return Ok(Location { path, dialect });
            }
            searched.push(path);
        }
        Err(ViewError::NotFound {
            name: name.to_string(),
            searched,
        })
    }

    /// Whether `name` resolves to a template file
    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// All resolvable view names under the root, sorted
    ///
    /// A name backed by both dialects is listed once. Files whose names
    /// do not round-trip through dotted form (an extra dot in a file
    /// name, say) are skipped because no name can reach them.
    pub fn available(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = self.name_for(entry.path()) else {
                continue;
            };
            if self.exists(&name) {
                names.insert(name);
            }
        }
        names.into_iter().collect()
    }

    fn candidate(&self, name: &str, extension: &str) -> PathBuf {
        let mut path = self.root.clone();
        let mut segments = name.split('.').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{segment}{extension}"));
            }
        }
        path
    }

    /// Dotted name for a file under the root, if it carries a known extension
    fn name_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut parts: Vec<String> = Vec::new();
        for component in rel.components() {
            parts.push(component.as_os_str().to_str()?.to_string());
        }
        let file = parts.pop()?;
        let core = file
            .strip_suffix(self.decorated_extension.as_str())
            .or_else(|| file.strip_suffix(self.plain_extension.as_str()))?;
        if core.is_empty() {
            return None;
        }
        parts.push(core.to_string());
        Some(parts.join("."))
    }
}

/// Reject names that are empty, have empty segments, or use characters
/// outside `[A-Za-z0-9_-]`; path separators can never reach the filesystem
fn validate_name(name: &str) -> Result<(), ViewError> {
    let invalid = || ViewError::InvalidName {
        name: name.to_string(),
    };
    if name.is_empty() {
        return Err(invalid());
    }
    for segment in name.split('.') {
        if segment.is_empty() {
            return Err(invalid());
        }
        let ok = segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !ok {
            return Err(invalid());
        }
    }
    Ok(())
}

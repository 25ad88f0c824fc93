//! Compiled program cache
//!
//! Decorated templates are parsed once per file and reused across renders.
//! Each entry remembers the source file's modification time; a render that
//! finds a different mtime recompiles and replaces the entry. Reads vastly
//! outnumber writes, so entries sit behind an `RwLock`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use tracing::debug;

use crate::error::ViewError;
use crate::template::parser;
use crate::template::program::{Dialect, Program};

/// A compile result tied to the source file's mtime
struct CachedProgram {
    modified: SystemTime,
    program: Arc<Program>,
}

/// Mtime-validated cache of compiled templates
#[derive(Default)]
pub(crate) struct ProgramCache {
    entries: RwLock<HashMap<PathBuf, CachedProgram>>,
}

impl ProgramCache {
    /// Compile the template at `path`, reusing the cached program while the
    /// file keeps its modification time
    ///
    /// `name` is the logical view name, used only for error context.
    pub fn compile(
        &self,
        name: &str,
        path: &Path,
        dialect: Dialect,
    ) -> Result<Arc<Program>, ViewError> {
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|source| ViewError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        if let Ok(entries) = self.entries.read()
            && let Some(cached) = entries.get(path)
            && cached.modified == modified
        {
            return Ok(Arc::clone(&cached.program));
        }

        debug!(view = name, path = ?path, "compiling template");
        let source = fs::read_to_string(path).map_err(|source| ViewError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let program = parser::parse(&source, dialect).map_err(|source| ViewError::Template {
            view: name.to_string(),
            source,
        })?;
        let program = Arc::new(program);

        // a poisoned lock just means this compile is not remembered
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                path.to_path_buf(),
                CachedProgram {
                    modified,
                    program: Arc::clone(&program),
                },
            );
        }
        Ok(program)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }
}

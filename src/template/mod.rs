//! Template compilation and evaluation
//!
//! Templates compile to a fixed instruction set (text, interpolation,
//! conditionals, loops, includes) and are interpreted against a view's
//! data. There is no expression language beyond dotted paths and no way
//! for a template to call into host code.
//!
//! Two dialects share the machinery. Decorated sources get the full
//! grammar and a compile cache; plain sources get interpolation only and
//! are read fresh on every render.

mod cache;
mod eval;
mod parser;
mod program;

pub use program::{Dialect, Op, Program};

pub(crate) use eval::{EvalContext, IncludeRenderer, render};

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::ViewsConfig;
use crate::data::ViewData;
use crate::error::{TemplateError, ViewError};

/// Compiles template files on behalf of the view factory
///
/// Decorated programs are cached per path and revalidated by file mtime;
/// plain content is read and parsed on every render so edits show up
/// immediately.
#[derive(Default)]
pub(crate) struct TemplateCompiler {
    cache: cache::ProgramCache,
}

impl TemplateCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile the file backing the view `name`
    pub fn compile_file(
        &self,
        name: &str,
        path: &Path,
        dialect: Dialect,
    ) -> Result<Arc<Program>, ViewError> {
        match dialect {
            Dialect::Decorated => self.cache.compile(name, path, dialect),
            Dialect::Plain => {
                let source = fs::read_to_string(path).map_err(|source| ViewError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let program = compile_source(&source, dialect).map_err(|source| {
                    ViewError::Template {
                        view: name.to_string(),
                        source,
                    }
                })?;
                Ok(Arc::new(program))
            }
        }
    }
}

/// Compile a template from an in-memory string
pub fn compile_source(source: &str, dialect: Dialect) -> Result<Program, TemplateError> {
    parser::parse(source, dialect)
}

/// Render a template string directly against a data bag
///
/// A convenience for snippets that live outside the views tree. Include
/// tags fail here: without a factory there is nothing to include from.
pub fn render_source(
    source: &str,
    data: &ViewData,
    dialect: Dialect,
) -> Result<String, TemplateError> {
    let program = compile_source(source, dialect)?;
    let ctx = EvalContext {
        includes: &NoIncludes,
        depth: 0,
        depth_limit: ViewsConfig::default().include_depth,
    };
    render(&program, data, &ctx)
}

struct NoIncludes;

impl IncludeRenderer for NoIncludes {
    fn render_include(
        &self,
        name: &str,
        _scope: ViewData,
        _depth: usize,
    ) -> Result<String, ViewError> {
        Err(ViewError::NotFound {
            name: name.to_string(),
            searched: Vec::new(),
        })
    }
}

//! View and template error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving, composing, or rendering views
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("View '{name}' not found (searched {searched:?})")]
    NotFound { name: String, searched: Vec<PathBuf> },

    #[error("Named view '{alias}' is not defined")]
    UndefinedAlias { alias: String },

    #[error("Undefined data key '{key}'")]
    UndefinedKey { key: String },

    #[error("Invalid view name '{name}'")]
    InvalidName { name: String },

    #[error("Template error in view '{view}': {source}")]
    Template {
        view: String,
        #[source]
        source: TemplateError,
    },

    #[error("Failed to read template: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load config: {path}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl ViewError {
    /// Check whether this error means the requested view simply does not
    /// exist (as opposed to being broken). Callers typically map this to a
    /// not-found response rather than a server error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ViewError::NotFound { .. } | ViewError::UndefinedAlias { .. }
        )
    }
}

/// Errors raised while compiling or evaluating a template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Unclosed tag on line {line}")]
    UnclosedTag { line: usize },

    #[error("Unexpected '{tag}' on line {line}")]
    UnexpectedTag { line: usize, tag: String },

    #[error("Block '{block}' opened on line {line} is never closed")]
    UnterminatedBlock { line: usize, block: String },

    #[error("Bad expression on line {line}: {reason}")]
    BadExpression { line: usize, reason: String },

    #[error("Undefined variable '{path}'")]
    UndefinedVariable { path: String },

    #[error("Cannot loop over '{path}': value is not a list or map")]
    NotIterable { path: String },

    #[error("Include depth limit of {limit} exceeded")]
    IncludeDepth { limit: usize },

    #[error("Failed to include view '{name}'")]
    Include {
        name: String,
        #[source]
        source: Box<ViewError>,
    },
}

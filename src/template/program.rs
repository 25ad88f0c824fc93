//! Compiled template representation
//!
//! A template compiles to a flat tree of [`Op`]s. The instruction set is
//! fixed: literal text, interpolation, conditionals, loops, and includes.
//! There is no way to express host-code calls, so executing a program can
//! touch nothing outside the data it is handed.

use std::fmt;

/// Which template grammar a source file is compiled under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Full grammar: interpolation, blocks, includes, comments
    Decorated,

    /// Interpolation only; block and comment tags pass through as text
    Plain,
}

/// A dotted lookup path, split into segments
///
/// Segments are identifiers or bare indices, so `users.0.name` reaches
/// into the first element of an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub segments: Vec<String>,
}

impl PathExpr {
    /// Parse a dotted path, or `None` when a segment is malformed
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        for segment in &segments {
            if !is_identifier(segment) && !is_index(segment) {
                return None;
            }
        }
        Some(PathExpr { segments })
    }

    /// The head segment, which picks the scope the path resolves in
    pub fn head(&self) -> &str {
        &self.segments[0]
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// A conditional test: truthiness of a path, optionally negated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cond {
    pub path: PathExpr,
    pub negated: bool,
}

/// Loop binding introduced by a `for` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopVar {
    /// `for item in items`: binds each element
    Item(String),

    /// `for key, value in map`: binds each entry of an object
    Pair(String, String),
}

/// One template instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Literal text, emitted as-is
    Text(String),

    /// Interpolate the value at `path`; `escape` is false for `{{{ }}}`
    Emit { path: PathExpr, escape: bool },

    /// Conditional: run `then` when the test holds, `otherwise` when not
    If {
        cond: Cond,
        then: Vec<Op>,
        otherwise: Vec<Op>,
    },

    /// Loop `body` over the value at `over`
    For {
        var: LoopVar,
        over: PathExpr,
        body: Vec<Op>,
    },

    /// Render another view by dotted name and splice in its output
    Include { name: String },
}

/// A compiled template, ready to interpret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub dialect: Dialect,
    pub ops: Vec<Op>,
}

/// True for a bare identifier: letter or underscore, then word characters
pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_index(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

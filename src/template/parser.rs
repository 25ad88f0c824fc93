//! Template source parser
//!
//! A single forward scan over the source. Literal text accumulates until a
//! tag opener, tags are parsed in place, and block structure is kept on an
//! explicit frame stack so close tags can be matched and reported with the
//! opening line when they never arrive.
//!
//! The plain dialect recognizes only interpolation tags; block and comment
//! openers pass through as literal text.

use crate::error::TemplateError;
use crate::template::program::{Cond, Dialect, LoopVar, Op, PathExpr, Program, is_identifier};

/// Parse `source` under `dialect` into a compiled program
pub fn parse(source: &str, dialect: Dialect) -> Result<Program, TemplateError> {
    let parser = Parser {
        source,
        pos: 0,
        line: 1,
        dialect,
        ops: Vec::new(),
        stack: Vec::new(),
    };
    parser.run()
}

/// Tag opener classification
#[derive(Clone, Copy)]
enum TagKind {
    /// `{{{ path }}}`, verbatim interpolation
    Raw,
    /// `{{ path }}`, escaped interpolation
    Escaped,
    /// `{% keyword ... %}`
    Block,
    /// `{# ... #}`, dropped from output
    Comment,
}

impl TagKind {
    fn open(self) -> &'static str {
        match self {
            TagKind::Raw => "{{{",
            TagKind::Escaped => "{{",
            TagKind::Block => "{%",
            TagKind::Comment => "{#",
        }
    }

    fn close(self) -> &'static str {
        match self {
            TagKind::Raw => "}}}",
            TagKind::Escaped => "}}",
            TagKind::Block => "%}",
            TagKind::Comment => "#}",
        }
    }
}

/// An open block whose close tag has not been seen yet
struct Frame {
    kind: FrameKind,
    /// Ops of the enclosing scope, restored when this block closes
    enclosing: Vec<Op>,
}

enum FrameKind {
    If {
        cond: Cond,
        /// Set once `else` is seen; current ops then collect the else arm
        then: Option<Vec<Op>>,
        line: usize,
    },
    For {
        var: LoopVar,
        over: PathExpr,
        line: usize,
    },
}

impl FrameKind {
    fn name(&self) -> &'static str {
        match self {
            FrameKind::If { .. } => "if",
            FrameKind::For { .. } => "for",
        }
    }

    fn line(&self) -> usize {
        match self {
            FrameKind::If { line, .. } | FrameKind::For { line, .. } => *line,
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    dialect: Dialect,
    /// Ops of the innermost open scope
    ops: Vec<Op>,
    stack: Vec<Frame>,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Result<Program, TemplateError> {
        let mut text_start = self.pos;
        while self.pos < self.source.len() {
            let rest = self.rest();
            if !rest.starts_with('{') {
                match rest.find('{') {
                    Some(offset) => self.advance(offset),
                    None => self.advance(rest.len()),
                }
                continue;
            }
            let Some(kind) = self.classify(rest) else {
                // a lone brace is ordinary text
                self.advance(1);
                continue;
            };
            self.flush_text(text_start);
            self.consume_tag(kind)?;
            text_start = self.pos;
        }
        self.flush_text(text_start);

        if let Some(frame) = self.stack.last() {
            return Err(TemplateError::UnterminatedBlock {
                line: frame.kind.line(),
                block: frame.kind.name().to_string(),
            });
        }
        Ok(Program {
            dialect: self.dialect,
            ops: self.ops,
        })
    }

    /// Unscanned source from the current position
    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.source[start..end]
    }

    /// Identify the tag starting at `rest`, which begins with `{`
    fn classify(&self, rest: &str) -> Option<TagKind> {
        if rest.starts_with("{{{") {
            return Some(TagKind::Raw);
        }
        if rest.starts_with("{{") {
            return Some(TagKind::Escaped);
        }
        if self.dialect == Dialect::Plain {
            return None;
        }
        if rest.starts_with("{%") {
            return Some(TagKind::Block);
        }
        if rest.starts_with("{#") {
            return Some(TagKind::Comment);
        }
        None
    }

    /// Move past `bytes` of source, keeping the line counter current
    fn advance(&mut self, bytes: usize) {
        let skipped = &self.source[self.pos..self.pos + bytes];
        self.line += skipped.matches('\n').count();
        self.pos += bytes;
    }

    fn flush_text(&mut self, start: usize) {
        if start < self.pos {
            self.ops.push(Op::Text(self.source[start..self.pos].to_string()));
        }
    }

    /// Parse one complete tag beginning at the current position
    fn consume_tag(&mut self, kind: TagKind) -> Result<(), TemplateError> {
        let tag_line = self.line;
        let body_start = self.pos + kind.open().len();
        let body_end = self.source[body_start..]
            .find(kind.close())
            .map(|offset| body_start + offset)
            .ok_or(TemplateError::UnclosedTag { line: tag_line })?;
        let inner = self.slice(body_start, body_end);
        self.advance(body_end + kind.close().len() - self.pos);

        match kind {
            TagKind::Comment => {}
            TagKind::Raw => {
                let path = parse_path(inner, tag_line)?;
                self.ops.push(Op::Emit { path, escape: false });
            }
            TagKind::Escaped => {
                let path = parse_path(inner, tag_line)?;
                self.ops.push(Op::Emit { path, escape: true });
            }
            TagKind::Block => self.block_tag(inner, tag_line)?,
        }
        Ok(())
    }

    fn block_tag(&mut self, inner: &str, line: usize) -> Result<(), TemplateError> {
        let inner = inner.trim();
        if inner.is_empty() {
            return Err(bad(line, "empty block tag"));
        }
        let (keyword, rest) = match inner.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (inner, ""),
        };
        match keyword {
            "if" => {
                let cond = parse_cond(rest, line)?;
                self.open_frame(FrameKind::If {
                    cond,
                    then: None,
                    line,
                });
            }
            "else" => {
                expect_bare(keyword, rest, line)?;
                let Some(Frame {
                    kind: FrameKind::If { then, .. },
                    ..
                }) = self.stack.last_mut()
                else {
                    return Err(unexpected(keyword, line));
                };
                if then.is_some() {
                    // a second else inside the same if
                    return Err(unexpected(keyword, line));
                }
                *then = Some(std::mem::take(&mut self.ops));
            }
            "endif" => {
                expect_bare(keyword, rest, line)?;
                let frame = self.close_frame(keyword, line)?;
                let FrameKind::If { cond, then, .. } = frame.kind else {
                    return Err(unexpected(keyword, line));
                };
                let closed = std::mem::replace(&mut self.ops, frame.enclosing);
                let (then, otherwise) = match then {
                    Some(then) => (then, closed),
                    None => (closed, Vec::new()),
                };
                self.ops.push(Op::If {
                    cond,
                    then,
                    otherwise,
                });
            }
            "for" => {
                let (var, over) = parse_for(rest, line)?;
                self.open_frame(FrameKind::For { var, over, line });
            }
            "endfor" => {
                expect_bare(keyword, rest, line)?;
                let frame = self.close_frame(keyword, line)?;
                let FrameKind::For { var, over, .. } = frame.kind else {
                    return Err(unexpected(keyword, line));
                };
                let body = std::mem::replace(&mut self.ops, frame.enclosing);
                self.ops.push(Op::For { var, over, body });
            }
            "include" => {
                let name = parse_include(rest, line)?;
                self.ops.push(Op::Include { name });
            }
            _ => return Err(unexpected(keyword, line)),
        }
        Ok(())
    }

    fn open_frame(&mut self, kind: FrameKind) {
        let enclosing = std::mem::take(&mut self.ops);
        self.stack.push(Frame { kind, enclosing });
    }

    fn close_frame(&mut self, keyword: &str, line: usize) -> Result<Frame, TemplateError> {
        self.stack.pop().ok_or_else(|| unexpected(keyword, line))
    }
}

fn bad(line: usize, reason: impl Into<String>) -> TemplateError {
    TemplateError::BadExpression {
        line,
        reason: reason.into(),
    }
}

fn unexpected(tag: &str, line: usize) -> TemplateError {
    TemplateError::UnexpectedTag {
        line,
        tag: tag.to_string(),
    }
}

fn expect_bare(keyword: &str, rest: &str, line: usize) -> Result<(), TemplateError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(bad(line, format!("unexpected text after '{keyword}'")))
    }
}

fn parse_path(raw: &str, line: usize) -> Result<PathExpr, TemplateError> {
    PathExpr::parse(raw).ok_or_else(|| bad(line, format!("invalid path '{}'", raw.trim())))
}

fn parse_cond(rest: &str, line: usize) -> Result<Cond, TemplateError> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let (negated, raw) = match tokens.as_slice() {
        [path] => (false, *path),
        ["not", path] => (true, *path),
        _ => return Err(bad(line, "expected 'if [not] <path>'")),
    };
    Ok(Cond {
        path: parse_path(raw, line)?,
        negated,
    })
}

fn parse_for(rest: &str, line: usize) -> Result<(LoopVar, PathExpr), TemplateError> {
    // commas become their own token so `k,v` and `k, v` parse alike
    let mut tokens: Vec<&str> = Vec::new();
    for piece in rest.split_whitespace() {
        let mut piece = piece;
        while let Some(at) = piece.find(',') {
            if at > 0 {
                tokens.push(&piece[..at]);
            }
            tokens.push(",");
            piece = &piece[at + 1..];
        }
        if !piece.is_empty() {
            tokens.push(piece);
        }
    }
    let (var, raw) = match tokens.as_slice() {
        [item, "in", path] => (LoopVar::Item(binding(item, line)?), *path),
        [key, ",", value, "in", path] => (
            LoopVar::Pair(binding(key, line)?, binding(value, line)?),
            *path,
        ),
        _ => return Err(bad(line, "expected 'for <binding> in <path>'")),
    };
    Ok((var, parse_path(raw, line)?))
}

fn binding(name: &str, line: usize) -> Result<String, TemplateError> {
    if name == "loop" {
        return Err(bad(line, "'loop' is reserved inside for blocks"));
    }
    if !is_identifier(name) {
        return Err(bad(line, format!("invalid loop binding '{name}'")));
    }
    Ok(name.to_string())
}

fn parse_include(rest: &str, line: usize) -> Result<String, TemplateError> {
    let name = rest
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| rest.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
        .ok_or_else(|| bad(line, "include name must be quoted"))?;
    if name.is_empty() {
        return Err(bad(line, "include name is empty"));
    }
    Ok(name.to_string())
}

//! Template program interpreter
//!
//! Walks a compiled [`Program`] against a view's data and produces the
//! output string. Loop blocks push scope frames; path lookup checks the
//! innermost frame first and falls back to the data bag. Includes are
//! delegated to an [`IncludeRenderer`] so the interpreter itself never
//! touches the filesystem.

use serde_json::Value;

use crate::data::{DataValue, ViewData};
use crate::error::{TemplateError, ViewError};
use crate::template::program::{LoopVar, Op, PathExpr, Program};

/// Renders views referenced by `include` tags
///
/// `scope` is a snapshot of the data visible at the include site and
/// `depth` is the nesting level the included render starts at.
pub(crate) trait IncludeRenderer {
    fn render_include(
        &self,
        name: &str,
        scope: ViewData,
        depth: usize,
    ) -> Result<String, ViewError>;
}

/// Per-render settings threaded through the interpreter
pub(crate) struct EvalContext<'a> {
    pub includes: &'a dyn IncludeRenderer,
    /// How many includes deep this render already is
    pub depth: usize,
    pub depth_limit: usize,
}

/// Interpret `program` against `data`
pub(crate) fn render<'a>(
    program: &'a Program,
    data: &'a ViewData,
    ctx: &'a EvalContext<'a>,
) -> Result<String, TemplateError> {
    let mut evaluator = Evaluator {
        data,
        ctx,
        frames: Vec::new(),
        out: String::new(),
    };
    evaluator.exec(&program.ops)?;
    Ok(evaluator.out)
}

/// Escape the five HTML-significant characters
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// A value bound by the innermost enclosing loop iteration
enum Slot<'a> {
    Borrowed(&'a Value),
    /// Object keys are materialized per iteration
    Owned(Value),
}

struct Frame<'a> {
    bindings: Vec<(&'a str, Slot<'a>)>,
    index: usize,
    len: usize,
}

/// A successful path lookup
enum Resolved<'a> {
    Value(&'a Value),
    Markup(&'a str),
    /// Synthesized on the fly (loop metadata, object keys); always scalar
    Synth(Value),
}

struct Evaluator<'a> {
    data: &'a ViewData,
    ctx: &'a EvalContext<'a>,
    frames: Vec<Frame<'a>>,
    out: String,
}

impl<'a> Evaluator<'a> {
    fn exec(&mut self, ops: &'a [Op]) -> Result<(), TemplateError> {
        for op in ops {
            match op {
                Op::Text(text) => self.out.push_str(text),
                Op::Emit { path, escape } => self.emit(path, *escape)?,
                Op::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    // a missing path simply fails the test
                    let holds = match self.resolve(&cond.path) {
                        Some(resolved) => truthy(&resolved),
                        None => false,
                    };
                    if holds != cond.negated {
                        self.exec(then)?;
                    } else {
                        self.exec(otherwise)?;
                    }
                }
                Op::For { var, over, body } => self.exec_for(var, over, body)?,
                Op::Include { name } => self.exec_include(name)?,
            }
        }
        Ok(())
    }

    fn emit(&mut self, path: &PathExpr, escape: bool) -> Result<(), TemplateError> {
        let resolved = self.resolve(path).ok_or_else(|| undefined(path))?;
        match resolved {
            // markup is trusted output and is never re-escaped
            Resolved::Markup(markup) => self.out.push_str(markup),
            Resolved::Value(value) => self.push_value(value, escape),
            Resolved::Synth(value) => self.push_value(&value, escape),
        }
        Ok(())
    }

    fn push_value(&mut self, value: &Value, escape: bool) {
        let text = stringify(value);
        if escape {
            self.out.push_str(&escape_html(&text));
        } else {
            self.out.push_str(&text);
        }
    }

    fn exec_for(
        &mut self,
        var: &'a LoopVar,
        over: &'a PathExpr,
        body: &'a [Op],
    ) -> Result<(), TemplateError> {
        let resolved = self.resolve(over).ok_or_else(|| undefined(over))?;
        let Resolved::Value(value) = resolved else {
            // markup and synthesized scalars cannot be looped
            return Err(not_iterable(over));
        };
        match (var, value) {
            (LoopVar::Item(name), Value::Array(items)) => {
                let len = items.len();
                for (index, item) in items.iter().enumerate() {
                    self.run_iteration(
                        vec![(name.as_str(), Slot::Borrowed(item))],
                        index,
                        len,
                        body,
                    )?;
                }
                Ok(())
            }
            (LoopVar::Pair(key_name, value_name), Value::Object(map)) => {
                let len = map.len();
                for (index, (key, item)) in map.iter().enumerate() {
                    self.run_iteration(
                        vec![
                            (key_name.as_str(), Slot::Owned(Value::String(key.clone()))),
                            (value_name.as_str(), Slot::Borrowed(item)),
                        ],
                        index,
                        len,
                        body,
                    )?;
                }
                Ok(())
            }
            _ => Err(not_iterable(over)),
        }
    }

    fn run_iteration(
        &mut self,
        bindings: Vec<(&'a str, Slot<'a>)>,
        index: usize,
        len: usize,
        body: &'a [Op],
    ) -> Result<(), TemplateError> {
        self.frames.push(Frame {
            bindings,
            index,
            len,
        });
        let result = self.exec(body);
        self.frames.pop();
        result
    }

    fn exec_include(&mut self, name: &str) -> Result<(), TemplateError> {
        let depth = self.ctx.depth + 1;
        if depth > self.ctx.depth_limit {
            return Err(TemplateError::IncludeDepth {
                limit: self.ctx.depth_limit,
            });
        }
        let scope = self.snapshot_scope();
        let rendered = self
            .ctx
            .includes
            .render_include(name, scope, depth)
            .map_err(|source| TemplateError::Include {
                name: name.to_string(),
                source: Box::new(source),
            })?;
        self.out.push_str(&rendered);
        Ok(())
    }

    /// Everything visible at this point, flattened into a fresh bag
    fn snapshot_scope(&self) -> ViewData {
        let mut scope = self.data.clone_flat();
        for frame in &self.frames {
            for (name, slot) in &frame.bindings {
                let value = match slot {
                    Slot::Borrowed(value) => (*value).clone(),
                    Slot::Owned(value) => value.clone(),
                };
                scope.set(*name, value);
            }
        }
        scope
    }

    fn resolve(&self, path: &PathExpr) -> Option<Resolved<'a>> {
        let head = path.head();
        let rest = &path.segments[1..];

        // inside a for block `loop` names the innermost iteration
        if head == "loop"
            && let Some(frame) = self.frames.last()
        {
            return resolve_loop_meta(path, frame);
        }

        for frame in self.frames.iter().rev() {
            for (name, slot) in &frame.bindings {
                if *name != head {
                    continue;
                }
                return match slot {
                    Slot::Borrowed(value) => walk(*value, rest).map(Resolved::Value),
                    Slot::Owned(value) => walk(value, rest).map(|v| Resolved::Synth(v.clone())),
                };
            }
        }

        match self.data.lookup(head)? {
            DataValue::Value(value) => walk(value, rest).map(Resolved::Value),
            DataValue::Markup(markup) => rest.is_empty().then_some(Resolved::Markup(markup)),
            DataValue::Renderable(_) => None,
        }
    }
}

fn resolve_loop_meta<'a>(path: &PathExpr, frame: &Frame<'_>) -> Option<Resolved<'a>> {
    if path.segments.len() != 2 {
        return None;
    }
    match path.segments[1].as_str() {
        "index" => Some(Resolved::Synth(Value::from(frame.index))),
        "first" => Some(Resolved::Synth(Value::Bool(frame.index == 0))),
        "last" => Some(Resolved::Synth(Value::Bool(frame.index + 1 == frame.len))),
        _ => None,
    }
}

/// Descend into `value` one segment at a time
fn walk<'v>(value: &'v Value, segments: &[String]) -> Option<&'v Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn truthy(resolved: &Resolved<'_>) -> bool {
    match resolved {
        Resolved::Markup(markup) => !markup.is_empty(),
        Resolved::Value(value) => truthy_value(value),
        Resolved::Synth(value) => truthy_value(value),
    }
}

fn truthy_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn undefined(path: &PathExpr) -> TemplateError {
    TemplateError::UndefinedVariable {
        path: path.to_string(),
    }
}

fn not_iterable(path: &PathExpr) -> TemplateError {
    TemplateError::NotIterable {
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::parse;
    use crate::template::program::Dialect;
    use serde_json::json;
    use std::sync::Mutex;

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
                searched: vec![],
            })
        }
    }

    fn eval(source: &str, data: &ViewData) -> Result<String, TemplateError> {
        let program = parse(source, Dialect::Decorated).unwrap();
        let ctx = EvalContext {
            includes: &NoIncludes,
            depth: 0,
            depth_limit: 32,
        };
        render(&program, data, &ctx)
    }

    #[test]
    fn test_escaped_interpolation() {
        let data: ViewData = [("name", "<b>\"O'Hara\" & co</b>")].into_iter().collect();
        let out = eval("Hi {{ name }}!", &data).unwrap();
        assert_eq!(out, "Hi &lt;b&gt;&quot;O&#39;Hara&quot; &amp; co&lt;/b&gt;!");
    }

    #[test]
    fn test_raw_interpolation() {
        let data: ViewData = [("body", "<p>x</p>")].into_iter().collect();
        assert_eq!(eval("{{{ body }}}", &data).unwrap(), "<p>x</p>");
    }

    #[test]
    fn test_markup_never_escaped() {
        let mut data = ViewData::new();
        data.set("inner", DataValue::markup("<section>done</section>"));
        assert_eq!(eval("{{ inner }}", &data).unwrap(), "<section>done</section>");
        assert_eq!(eval("{{{ inner }}}", &data).unwrap(), "<section>done</section>");
    }

    #[test]
    fn test_missing_path_is_undefined() {
        let data = ViewData::new();
        let err = eval("{{ user.name }}", &data).unwrap_err();
        assert!(
            matches!(err, TemplateError::UndefinedVariable { ref path } if path == "user.name")
        );
    }

    #[test]
    fn test_null_prints_empty() {
        let mut data = ViewData::new();
        data.set("gone", Value::Null);
        assert_eq!(eval("[{{ gone }}]", &data).unwrap(), "[]");
    }

    #[test]
    fn test_scalar_stringification() {
        let mut data = ViewData::new();
        data.set("n", 42);
        data.set("f", 1.5);
        data.set("b", true);
        data.set("list", json!([1, 2]));
        assert_eq!(eval("{{ n }}/{{ f }}/{{ b }}/{{ list }}", &data).unwrap(), "42/1.5/true/[1,2]");
    }

    #[test]
    fn test_dotted_traversal_with_index() {
        let mut data = ViewData::new();
        data.set("users", json!([{"name": "Ada"}, {"name": "Brin"}]));
        assert_eq!(eval("{{ users.1.name }}", &data).unwrap(), "Brin");
    }

    #[test]
    fn test_if_truthiness() {
        for (value, expected) in [
            (json!(false), "no"),
            (json!(0), "no"),
            (json!(0.0), "no"),
            (json!(""), "no"),
            (json!([]), "no"),
            (json!({}), "no"),
            (json!(null), "no"),
            (json!(1), "yes"),
            (json!("x"), "yes"),
            (json!([0]), "yes"),
        ] {
            let mut data = ViewData::new();
            data.set("it", value.clone());
            let out = eval("{% if it %}yes{% else %}no{% endif %}", &data).unwrap();
            assert_eq!(out, expected, "truthiness of {value}");
        }
    }

    #[test]
    fn test_if_missing_path_is_false() {
        let data = ViewData::new();
        let out = eval("{% if absent %}a{% else %}b{% endif %}", &data).unwrap();
        assert_eq!(out, "b");
    }

    #[test]
    fn test_if_not() {
        let mut data = ViewData::new();
        data.set("hidden", false);
        assert_eq!(eval("{% if not hidden %}shown{% endif %}", &data).unwrap(), "shown");
    }

    #[test]
    fn test_markup_is_truthy_when_nonempty() {
        let mut data = ViewData::new();
        data.set("frag", DataValue::markup("<hr>"));
        data.set("empty", DataValue::markup(""));
        assert_eq!(eval("{% if frag %}y{% endif %}", &data).unwrap(), "y");
        assert_eq!(eval("{% if empty %}y{% else %}n{% endif %}", &data).unwrap(), "n");
    }

    #[test]
    fn test_for_array_with_loop_meta() {
        let mut data = ViewData::new();
        data.set("xs", json!(["a", "b", "c"]));
        let out = eval(
            "{% for x in xs %}{{ loop.index }}:{{ x }}{% if not loop.last %},{% endif %}{% endfor %}",
            &data,
        )
        .unwrap();
        assert_eq!(out, "0:a,1:b,2:c");
    }

    #[test]
    fn test_for_first_flag() {
        let mut data = ViewData::new();
        data.set("xs", json!([10, 20]));
        let out = eval("{% for x in xs %}{% if loop.first %}[{% endif %}{{ x }}{% endfor %}", &data)
            .unwrap();
        assert_eq!(out, "[1020");
    }

    #[test]
    fn test_for_pair_over_object() {
        let mut data = ViewData::new();
        data.set("settings", json!({"theme": "dark", "lang": "en"}));
        let out = eval("{% for k, v in settings %}{{ k }}={{ v }};{% endfor %}", &data).unwrap();
        assert_eq!(out, "theme=dark;lang=en;");
    }

    #[test]
    fn test_loop_var_shadows_data_key() {
        let mut data = ViewData::new();
        data.set("x", "outer");
        data.set("xs", json!(["inner"]));
        let out = eval("{{ x }}|{% for x in xs %}{{ x }}{% endfor %}|{{ x }}", &data).unwrap();
        assert_eq!(out, "outer|inner|outer");
    }

    #[test]
    fn test_nested_loops_inner_meta() {
        let mut data = ViewData::new();
        data.set("rows", json!([[1, 2], [3]]));
        let out = eval(
            "{% for row in rows %}{% for cell in row %}{{ loop.index }}{% endfor %};{% endfor %}",
            &data,
        )
        .unwrap();
        assert_eq!(out, "01;0;");
    }

    #[test]
    fn test_empty_array_renders_nothing() {
        let mut data = ViewData::new();
        data.set("xs", json!([]));
        assert_eq!(eval("<{% for x in xs %}{{ x }}{% endfor %}>", &data).unwrap(), "<>");
    }

    #[test]
    fn test_for_over_missing_is_undefined() {
        let data = ViewData::new();
        let err = eval("{% for x in xs %}{% endfor %}", &data).unwrap_err();
        assert!(matches!(err, TemplateError::UndefinedVariable { ref path } if path == "xs"));
    }

    #[test]
    fn test_for_over_scalar_is_not_iterable() {
        let mut data = ViewData::new();
        data.set("n", 3);
        let err = eval("{% for x in n %}{% endfor %}", &data).unwrap_err();
        assert!(matches!(err, TemplateError::NotIterable { ref path } if path == "n"));
    }

    #[test]
    fn test_binding_shape_must_match_value() {
        let mut data = ViewData::new();
        data.set("xs", json!([1]));
        data.set("m", json!({"a": 1}));
        assert!(matches!(
            eval("{% for k, v in xs %}{% endfor %}", &data).unwrap_err(),
            TemplateError::NotIterable { .. }
        ));
        assert!(matches!(
            eval("{% for x in m %}{% endfor %}", &data).unwrap_err(),
            TemplateError::NotIterable { .. }
        ));
    }

    #[test]
    fn test_unknown_loop_field_is_undefined() {
        let mut data = ViewData::new();
        data.set("xs", json!([1]));
        let err = eval("{% for x in xs %}{{ loop.size }}{% endfor %}", &data).unwrap_err();
        assert!(matches!(err, TemplateError::UndefinedVariable { .. }));
    }

    struct RecordingIncludes {
        calls: Mutex<Vec<(String, Vec<String>, usize)>>,
    }

    impl IncludeRenderer for RecordingIncludes {
        fn render_include(
            &self,
            name: &str,
            scope: ViewData,
            depth: usize,
        ) -> Result<String, ViewError> {
            let keys: Vec<String> = scope.keys().map(str::to_string).collect();
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), keys, depth));
            Ok(format!("[{name}]"))
        }
    }

    #[test]
    fn test_include_splices_output_and_scope() {
        let recorder = RecordingIncludes {
            calls: Mutex::new(Vec::new()),
        };
        let mut data = ViewData::new();
        data.set("title", "T");
        data.set("xs", json!(["only"]));

        let program = parse(
            "{% for x in xs %}{% include \"partials.row\" %}{% endfor %}",
            Dialect::Decorated,
        )
        .unwrap();
        let ctx = EvalContext {
            includes: &recorder,
            depth: 0,
            depth_limit: 32,
        };
        let out = render(&program, &data, &ctx).unwrap();

        assert_eq!(out, "[partials.row]");
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (name, keys, depth) = &calls[0];
        assert_eq!(name, "partials.row");
        assert_eq!(*depth, 1);
        // the loop binding is part of the snapshot
        assert!(keys.contains(&"x".to_string()));
        assert!(keys.contains(&"title".to_string()));
    }

    #[test]
    fn test_include_depth_limit() {
        let data = ViewData::new();
        let program = parse("{% include \"self\" %}", Dialect::Decorated).unwrap();
        let ctx = EvalContext {
            includes: &NoIncludes,
            depth: 32,
            depth_limit: 32,
        };
        let err = render(&program, &data, &ctx).unwrap_err();
        assert!(matches!(err, TemplateError::IncludeDepth { limit: 32 }));
    }

    #[test]
    fn test_include_failure_is_wrapped() {
        let data = ViewData::new();
        let err = eval("{% include \"missing.view\" %}", &data).unwrap_err();
        assert!(matches!(err, TemplateError::Include { ref name, .. } if name == "missing.view"));
    }
}

//! The view object
//!
//! A `View` pairs a resolved template file with the data bound for one
//! render. Views are request-scoped and single-use: `render` consumes the
//! view, runs its composers, flattens nested renderables, compiles the
//! template, and interprets it to a string.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::data::{DataValue, Renderable, ViewData};
use crate::error::ViewError;
use crate::factory::ViewFactory;
use crate::resolver::Location;
use crate::template::{self, Dialect, EvalContext};

pub struct View {
    name: String,
    location: Location,
    data: ViewData,
    factory: ViewFactory,
    /// Include nesting level this view renders at
    depth: usize,
}

impl View {
    pub(crate) fn new(
        name: String,
        location: Location,
        data: ViewData,
        factory: ViewFactory,
        depth: usize,
    ) -> Self {
        Self {
            name,
            location,
            data,
            factory,
            depth,
        }
    }

    /// The dotted name this view was resolved from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The template file backing this view
    pub fn path(&self) -> &Path {
        &self.location.path
    }

    pub fn dialect(&self) -> Dialect {
        self.location.dialect
    }

    /// The data bound so far
    pub fn data(&self) -> &ViewData {
        &self.data
    }

    /// Bind `key` to `value`, chainable form
    pub fn bind(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.data.set(key, value);
        self
    }

    /// Bind `key` to `value` in place; the form composers use
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.data.set(key, value);
    }

    /// Strict read of a bound value
    pub fn get(&self, key: &str) -> Result<&DataValue, ViewError> {
        self.data.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.has(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        self.data.remove(key)
    }

    /// Bind another view under `key`, to be flattened when this one renders
    pub fn nest(self, key: impl Into<String>, name: &str) -> Result<Self, ViewError> {
        self.nest_with(key, name, ViewData::new())
    }

    /// Like [`nest`](Self::nest) with data for the nested view
    pub fn nest_with(
        self,
        key: impl Into<String>,
        name: &str,
        data: ViewData,
    ) -> Result<Self, ViewError> {
        let nested = self.factory.make_at_depth(name, data, self.depth + 1)?;
        Ok(self.bind(key, DataValue::renderable(nested)))
    }

    /// Render this view to its final string
    ///
    /// Composers run first (shared hook, then the view's own), nested
    /// renderables are flattened to markup, and the compiled template is
    /// interpreted against the data.
    pub fn render(mut self) -> Result<String, ViewError> {
        debug!(view = %self.name, dialect = ?self.location.dialect, "rendering view");
        let factory = self.factory.clone();
        factory.composers().compose(&mut self);
        self.data.flatten_renderables()?;

        let program =
            factory
                .compiler()
                .compile_file(&self.name, &self.location.path, self.location.dialect)?;
        let ctx = EvalContext {
            includes: &factory,
            depth: self.depth,
            depth_limit: factory.config().include_depth,
        };
        template::render(&program, &self.data, &ctx).map_err(|source| ViewError::Template {
            view: self.name.clone(),
            source,
        })
    }
}

impl Renderable for View {
    fn render(self: Box<Self>) -> Result<String, ViewError> {
        (*self).render()
    }
}

impl From<View> for DataValue {
    fn from(view: View) -> Self {
        DataValue::renderable(view)
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("path", &self.location.path)
            .field("dialect", &self.location.dialect)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

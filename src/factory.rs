//! View factory
//!
//! The crate's entry point. The factory owns the resolver, the composer
//! registry, the template compiler, and the shared data bag, and hands out
//! [`View`]s. It is a cheap-clone handle over `Arc`-shared state, so one
//! factory serves an entire application.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::composer::{ComposerConfig, ComposerRegistry};
use crate::config::ViewsConfig;
use crate::data::{DataValue, ViewData};
use crate::error::ViewError;
use crate::resolver::ViewResolver;
use crate::template::{IncludeRenderer, TemplateCompiler};
use crate::view::View;

struct FactoryShared {
    config: ViewsConfig,
    resolver: ViewResolver,
    composers: ComposerRegistry,
    compiler: TemplateCompiler,
    /// Data bound into every view this factory builds
    shared_data: RwLock<ViewData>,
}

/// Builds views by name; clone freely, clones share all state
#[derive(Clone)]
pub struct ViewFactory {
    shared: Arc<FactoryShared>,
}

impl ViewFactory {
    /// Builder with default settings rooted at `root`
    pub fn builder(root: impl Into<PathBuf>) -> ViewFactoryBuilder {
        ViewFactoryBuilder::new(ViewsConfig::with_root(root))
    }

    /// Builder starting from an explicit settings block
    pub fn with_config(config: ViewsConfig) -> ViewFactoryBuilder {
        ViewFactoryBuilder::new(config)
    }

    /// Build the view `name` with no caller data
    pub fn make(&self, name: &str) -> Result<View, ViewError> {
        self.make_with(name, ViewData::new())
    }

    /// Build the view `name`; shared data is bound first, `data` wins on
    /// collision
    pub fn make_with(&self, name: &str, data: ViewData) -> Result<View, ViewError> {
        self.make_at_depth(name, data, 0)
    }

    pub(crate) fn make_at_depth(
        &self,
        name: &str,
        data: ViewData,
        depth: usize,
    ) -> Result<View, ViewError> {
        let location = self.shared.resolver.resolve(name)?;
        let mut bag = self.shared_snapshot();
        bag.merge(data);
        Ok(View::new(name.to_string(), location, bag, self.clone(), depth))
    }

    /// Build the view a registered alias points at
    pub fn named(&self, alias: &str) -> Result<View, ViewError> {
        self.named_with(alias, ViewData::new())
    }

    /// Like [`named`](Self::named) with caller data
    pub fn named_with(&self, alias: &str, data: ViewData) -> Result<View, ViewError> {
        let target = self
            .shared
            .composers
            .resolve_alias(alias)
            .map(str::to_string)
            .ok_or_else(|| ViewError::UndefinedAlias {
                alias: alias.to_string(),
            })?;
        self.make_with(&target, data)
    }

    /// Whether `name` resolves to a template file
    pub fn exists(&self, name: &str) -> bool {
        self.shared.resolver.exists(name)
    }

    /// All resolvable view names, sorted
    pub fn available(&self) -> Vec<String> {
        self.shared.resolver.available()
    }

    /// Bind `key` into every view built from now on
    ///
    /// Plain data and markup only. A renderable consumes itself on first
    /// render, so sharing one would work exactly once; such values are
    /// dropped with a warning.
    pub fn share(&self, key: impl Into<String>, value: impl Into<DataValue>) {
        let key = key.into();
        let value = value.into();
        if value.is_renderable() {
            warn!(key = %key, "shared values must be plain data or markup, dropping renderable");
            return;
        }
        if let Ok(mut shared) = self.shared.shared_data.write() {
            shared.set(key, value);
        }
    }

    pub fn config(&self) -> &ViewsConfig {
        &self.shared.config
    }

    pub fn composers(&self) -> &ComposerRegistry {
        &self.shared.composers
    }

    pub(crate) fn compiler(&self) -> &TemplateCompiler {
        &self.shared.compiler
    }

    fn shared_snapshot(&self) -> ViewData {
        self.shared
            .shared_data
            .read()
            .map(|bag| bag.clone_flat())
            .unwrap_or_default()
    }
}

impl IncludeRenderer for ViewFactory {
    fn render_include(
        &self,
        name: &str,
        scope: ViewData,
        depth: usize,
    ) -> Result<String, ViewError> {
        let view = self.make_at_depth(name, scope, depth)?;
        view.render()
    }
}

/// Accumulates factory settings before the shared state is frozen
pub struct ViewFactoryBuilder {
    config: ViewsConfig,
    composers: ComposerConfig,
    shared_data: ViewData,
}

impl ViewFactoryBuilder {
    fn new(config: ViewsConfig) -> Self {
        Self {
            config,
            composers: ComposerConfig::new(),
            shared_data: ViewData::new(),
        }
    }

    /// Replace the settings block, views root included
    pub fn config(mut self, config: ViewsConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the composer and alias table
    pub fn composers(mut self, composers: ComposerConfig) -> Self {
        self.composers = composers;
        self
    }

    /// Bind `key` into every view the factory will build
    pub fn share(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.shared_data.set(key, value);
        self
    }

    pub fn build(self) -> ViewFactory {
        let resolver = ViewResolver::new(&self.config);
        ViewFactory {
            shared: Arc::new(FactoryShared {
                resolver,
                composers: ComposerRegistry::new(self.composers),
                compiler: TemplateCompiler::new(),
                shared_data: RwLock::new(self.shared_data),
                config: self.config,
            }),
        }
    }
}

//! View composers
//!
//! A composer is a callback that runs against a view right before it
//! renders, typically to inject data the calling site should not have to
//! assemble itself. Composers are registered per view name; a single
//! shared hook can run for every view. The same table also records name
//! aliases, so `named("home")` can stand for a concrete view.

use std::sync::Arc;

use tracing::debug;

use crate::view::View;

/// A callback applied to a view before rendering
///
/// Implemented for any `Fn(&mut View)` closure.
pub trait Composer: Send + Sync {
    fn compose(&self, view: &mut View);
}

impl<F> Composer for F
where
    F: Fn(&mut View) + Send + Sync,
{
    fn compose(&self, view: &mut View) {
        self(view)
    }
}

#[derive(Clone, Default)]
struct ComposerEntry {
    /// Target view name this key stands for
    alias: Option<String>,
    handler: Option<Arc<dyn Composer>>,
}

/// Registration-time composer table, built up before the factory exists
///
/// Keys keep registration order. Registering an alias or handler for a key
/// that already has one replaces it.
#[derive(Clone, Default)]
pub struct ComposerConfig {
    entries: Vec<(String, ComposerEntry)>,
    shared: Option<Arc<dyn Composer>>,
}

impl ComposerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` as an alias for the view `target`
    pub fn alias(mut self, key: impl Into<String>, target: impl Into<String>) -> Self {
        let key = key.into();
        let target = target.into();
        let entry = self.entry_mut(key.clone());
        if entry.alias.is_some() {
            debug!(key, "replacing registered alias");
        }
        entry.alias = Some(target);
        self
    }

    /// Register a composer for the view named `key`
    pub fn handle(mut self, key: impl Into<String>, composer: impl Composer + 'static) -> Self {
        let key = key.into();
        let entry = self.entry_mut(key.clone());
        if entry.handler.is_some() {
            debug!(key, "replacing registered composer");
        }
        entry.handler = Some(Arc::new(composer));
        self
    }

    /// Register a composer that runs for every view, before any per-view one
    pub fn shared(mut self, composer: impl Composer + 'static) -> Self {
        if self.shared.is_some() {
            debug!("replacing shared composer");
        }
        self.shared = Some(Arc::new(composer));
        self
    }

    fn entry_mut(&mut self, key: String) -> &mut ComposerEntry {
        let index = match self.entries.iter().position(|(existing, _)| *existing == key) {
            Some(index) => index,
            None => {
                self.entries.push((key, ComposerEntry::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }
}

/// Read-only composer table held by the factory
pub struct ComposerRegistry {
    entries: Vec<(String, ComposerEntry)>,
    shared: Option<Arc<dyn Composer>>,
}

impl ComposerRegistry {
    pub(crate) fn new(config: ComposerConfig) -> Self {
        Self {
            entries: config.entries,
            shared: config.shared,
        }
    }

    /// Target view name for `alias`, when one is registered
    ///
    /// Resolution is a single step: the target is used as-is even if it is
    /// itself registered as an alias.
    pub fn resolve_alias(&self, alias: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == alias)
            .and_then(|(_, entry)| entry.alias.as_deref())
    }

    /// Run the shared hook, then the composer registered for this view
    pub(crate) fn compose(&self, view: &mut View) {
        if let Some(shared) = &self.shared {
            shared.compose(view);
        }
        let handler = self.handler_for(view.name());
        if let Some(handler) = handler {
            debug!(view = view.name(), "composer applied");
            handler.compose(view);
        }
    }

    fn handler_for(&self, name: &str) -> Option<Arc<dyn Composer>> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, entry)| entry.handler.clone())
    }
}

//! View data bag and bound value kinds
//!
//! A view's data is an ordered string-keyed bag. Values are either plain
//! JSON data (escaped when interpolated), pre-rendered markup (emitted
//! verbatim), or nested renderables that are flattened to markup right
//! before the owning template runs.

use std::fmt;

use serde_json::Value;

use crate::error::ViewError;

/// Anything that can render itself to a string
///
/// Values bound into view data that implement this are rendered before the
/// owning template executes, and the produced string replaces them as
/// [`DataValue::Markup`]. Rendering consumes the value: a renderable is
/// rendered once and discarded.
pub trait Renderable: Send + Sync {
    fn render(self: Box<Self>) -> Result<String, ViewError>;
}

/// A value bound into a view's data
pub enum DataValue {
    /// Plain data; strings are HTML-escaped at interpolation
    Value(Value),

    /// Pre-rendered trusted output, interpolated verbatim
    Markup(String),

    /// A nested renderable, flattened to `Markup` before the template runs
    Renderable(Box<dyn Renderable>),
}

impl DataValue {
    /// Wrap a pre-rendered string that must not be escaped again
    pub fn markup(content: impl Into<String>) -> Self {
        DataValue::Markup(content.into())
    }

    /// Wrap a nested renderable
    pub fn renderable(inner: impl Renderable + 'static) -> Self {
        DataValue::Renderable(Box::new(inner))
    }

    /// The plain JSON value, if this is one
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            DataValue::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The pre-rendered markup, if this is one
    pub fn as_markup(&self) -> Option<&str> {
        match self {
            DataValue::Markup(content) => Some(content),
            _ => None,
        }
    }

    /// Whether this value still awaits flattening
    pub fn is_renderable(&self) -> bool {
        matches!(self, DataValue::Renderable(_))
    }
}

impl fmt::Debug for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            DataValue::Markup(content) => f.debug_tuple("Markup").field(content).finish(),
            DataValue::Renderable(_) => f.write_str("Renderable(..)"),
        }
    }
}

impl From<Value> for DataValue {
    fn from(value: Value) -> Self {
        DataValue::Value(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::Value(Value::String(value))
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Value(Value::Bool(value))
    }
}

impl From<i32> for DataValue {
    fn from(value: i32) -> Self {
        DataValue::Value(Value::from(value))
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Value(Value::from(value))
    }
}

impl From<u64> for DataValue {
    fn from(value: u64) -> Self {
        DataValue::Value(Value::from(value))
    }
}

impl From<usize> for DataValue {
    fn from(value: usize) -> Self {
        DataValue::Value(Value::from(value))
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Value(Value::from(value))
    }
}

/// Ordered mapping from data key to bound value
///
/// Keys keep their first-insertion position; re-binding a key replaces the
/// value in place. The bag is small and request-scoped, so lookups are a
/// linear scan.
#[derive(Debug, Default)]
pub struct ViewData {
    entries: Vec<(String, DataValue)>,
}

impl ViewData {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `value`, replacing any existing binding
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Strict read: absent keys are an error
    pub fn get(&self, key: &str) -> Result<&DataValue, ViewError> {
        self.lookup(key).ok_or_else(|| ViewError::UndefinedKey {
            key: key.to_string(),
        })
    }

    /// Non-strict read
    pub fn lookup(&self, key: &str) -> Option<&DataValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Whether `key` is bound
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Remove and return the binding for `key`, if any
    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Number of bound keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate bindings in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Iterate keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Fold another bag into this one; `other`'s bindings win on collision
    pub fn merge(&mut self, other: ViewData) {
        for (key, value) in other.entries {
            self.set(key, value);
        }
    }

    /// Replace every renderable value with the markup it renders to
    ///
    /// Runs one level deep: nested renderables flatten their own data
    /// inside their own render call.
    pub(crate) fn flatten_renderables(&mut self) -> Result<(), ViewError> {
        let entries = std::mem::take(&mut self.entries);
        let mut flat = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let value = match value {
                DataValue::Renderable(inner) => DataValue::Markup(inner.render()?),
                other => other,
            };
            flat.push((key, value));
        }
        self.entries = flat;
        Ok(())
    }

    /// Copy of the bag holding only plain values and markup
    ///
    /// Used for include scopes; by the time a scope is snapshotted every
    /// renderable has already been flattened, so nothing is lost.
    pub(crate) fn clone_flat(&self) -> ViewData {
        let entries = self
            .entries
            .iter()
            .filter_map(|(key, value)| match value {
                DataValue::Value(v) => Some((key.clone(), DataValue::Value(v.clone()))),
                DataValue::Markup(m) => Some((key.clone(), DataValue::Markup(m.clone()))),
                DataValue::Renderable(_) => None,
            })
            .collect();
        ViewData { entries }
    }
}

impl<K, V> FromIterator<(K, V)> for ViewData
where
    K: Into<String>,
    V: Into<DataValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = ViewData::new();
        for (key, value) in iter {
            data.set(key, value);
        }
        data
    }
}

//! Viewsmith - View Resolution and Safe Template Rendering
//!
//! Viewsmith maps dotted view names (`admin.users.index`) to template files,
//! binds request data and composer-injected defaults into view objects, and
//! renders them through a deliberately small template dialect. Templates
//! carry no expression language and cannot reach host code, so rendering an
//! untrusted-adjacent template is never more dangerous than reading it.
//!
//! # Core Concepts
//!
//! - **Dotted Names**: `admin.users.index` resolves to a file under the
//!   views root; names are validated and can never escape it
//! - **Two Dialects**: decorated files get the full grammar, plain files
//!   get interpolation only and are read fresh every render
//! - **Composers**: per-view callbacks plus one shared hook inject data
//!   right before rendering
//! - **Single-Use Views**: a view renders once and is consumed; factories
//!   are the long-lived, thread-shared object
//!
//! # Modules
//!
//! - [`factory`] - the entry point, builds and shares views
//! - [`view`] - the view object and its render pipeline
//! - [`data`] - the ordered data bag and its value kinds
//! - [`composer`] - composer and alias registration
//! - [`resolver`] - dotted-name to file resolution
//! - [`template`] - parsing, compile caching, evaluation
//! - [`config`] - settings types and YAML loading
//! - [`error`] - the error taxonomy

pub mod composer;
pub mod config;
pub mod data;
pub mod error;
pub mod factory;
pub mod resolver;
pub mod template;
pub mod view;

// Re-export commonly used types
pub use composer::{Composer, ComposerConfig, ComposerRegistry};
pub use config::ViewsConfig;
pub use data::{DataValue, Renderable, ViewData};
pub use error::{TemplateError, ViewError};
pub use factory::{ViewFactory, ViewFactoryBuilder};
pub use resolver::{Location, ViewResolver};
pub use template::{Dialect, Op, Program, compile_source, render_source};
pub use view::View;

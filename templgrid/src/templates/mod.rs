//! Email template composition
//!
//! Provides the registry of raw email sources, the locale catalog and the
//! compositor that turns a source plus shared components into minified HTML.

pub mod compositor;
pub mod functions;
pub mod locale;
pub mod names;
pub mod printf;
pub mod registry;

pub use compositor::{Block, BuildResult, Compositor};
pub use functions::ArgsError;
pub use locale::{LocaleCatalog, LocaleTable};
pub use registry::{EmailTemplateSource, RegistrySnapshot, TemplateRegistry};

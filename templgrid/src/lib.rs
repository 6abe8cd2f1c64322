//! templgrid: transactional email templates
//!
//! Builds localized HTML emails from reusable components and keeps a remote
//! template store (SendGrid) in sync with the local sources.
//!
//! # Features
//!
//! - **Composition**: email sources define `subject` and `email_body` blocks
//!   and call macros from shared components
//! - **Localization**: per-locale message tables with printf-style formatting
//! - **Synchronization**: idempotent create / version / delete against SendGrid
//! - **Sending**: HTTP endpoint queueing render-and-send requests
//!
//! # Example
//!
//! ```no_run
//! use templgrid::templates::TemplateRegistry;
//!
//! let registry = TemplateRegistry::new();
//! registry.register(
//!     "Welcome",
//!     "{% block subject %}Hi {{ name }}{% endblock %}{% block email_body %}<p>Hello</p>{% endblock %}",
//! );
//!
//! let email = registry
//!     .build("Welcome", "", &serde_json::json!({"name": "Bob"}))
//!     .unwrap();
//! assert_eq!(email.subject, "Hi Bob");
//! ```
//!
//! # Modules
//!
//! - [`templates`]: compositor, helpers, locales and the registry
//! - [`input`]: template sources
//! - [`output`]: rendered template destinations
//! - [`sync`]: remote store client and reconciler
//! - [`generator`]: one-shot render + sync pipeline
//! - [`sender`]: send request queue and SendGrid delivery
//! - [`api`]: HTTP server
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling

pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod input;
pub mod output;
pub mod sender;
pub mod sync;
pub mod templates;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Result, TemplgridError};
pub use templates::{BuildResult, TemplateRegistry};

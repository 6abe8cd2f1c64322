//! Email template registry
//!
//! Holds the raw email sources, the shared components and the locale catalog
//! of the process. It is populated once at startup and read concurrently
//! afterwards: writers take a lock and swap in a new snapshot, readers clone
//! the current snapshot and never block each other.

use crate::error::{Result, TemplgridError};
use crate::templates::compositor::{BuildResult, Compositor};
use crate::templates::locale::LocaleCatalog;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Raw source of one email template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplateSource {
    /// Canonical template name
    pub name: String,
    /// Template text defining the `subject` and `email_body` blocks
    pub source: String,
}

/// Immutable view of the registry contents.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    templates: BTreeMap<String, Arc<EmailTemplateSource>>,
    components: Arc<Vec<String>>,
    locales: LocaleCatalog,
}

impl RegistrySnapshot {
    pub fn get(&self, name: &str) -> Option<&EmailTemplateSource> {
        self.templates.get(name).map(Arc::as_ref)
    }

    /// Templates sorted by name.
    pub fn templates(&self) -> impl Iterator<Item = &EmailTemplateSource> {
        self.templates.values().map(Arc::as_ref)
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn locales(&self) -> &LocaleCatalog {
        &self.locales
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Build an email from this snapshot.
    pub fn build(
        &self,
        name: &str,
        locale: &str,
        params: &serde_json::Value,
    ) -> Result<BuildResult> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TemplgridError::UnknownTemplate(name.to_string()))?;
        let table = self.locales.resolve(locale)?;

        debug!("Building email {} for locale '{}'", name, locale);

        Compositor::new(Arc::clone(&self.components), table).build(
            &template.name,
            &template.source,
            params,
        )
    }
}

/// Registry of templates, components and locales.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    state: RwLock<Arc<RegistrySnapshot>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a template. The last registration of a name wins.
    pub fn register(&self, name: impl Into<String>, source: impl Into<String>) {
        let template = EmailTemplateSource {
            name: name.into(),
            source: source.into(),
        };
        debug!("Registering email template {}", template.name);

        let mut state = self.state.write();
        Arc::make_mut(&mut state)
            .templates
            .insert(template.name.clone(), Arc::new(template));
    }

    /// Replace the component list. Order is significant.
    pub fn set_components(&self, components: Vec<String>) {
        let mut state = self.state.write();
        Arc::make_mut(&mut state).components = Arc::new(components);
    }

    pub fn set_locales(&self, locales: LocaleCatalog) {
        let mut state = self.state.write();
        Arc::make_mut(&mut state).locales = locales;
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state.read().templates.contains_key(name)
    }

    /// Fail with `UnknownTemplate` when `name` is not registered.
    pub fn ensure_exists(&self, name: &str) -> Result<()> {
        if self.exists(name) {
            Ok(())
        } else {
            Err(TemplgridError::UnknownTemplate(name.to_string()))
        }
    }

    /// Build subject and HTML body of `name` for `locale`.
    ///
    /// Registry errors (`UnknownTemplate`, `UnknownLocale`) are returned before
    /// any composition takes place.
    pub fn build(
        &self,
        name: &str,
        locale: &str,
        params: &serde_json::Value,
    ) -> Result<BuildResult> {
        self.snapshot().build(name, locale, params)
    }

    /// Current contents. Later registrations do not affect the returned value.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.state.read())
    }

    pub fn names(&self) -> Vec<String> {
        self.state.read().templates.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

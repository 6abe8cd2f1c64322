//! Locale catalogs: locale code -> message key -> format string

use crate::error::{Result, TemplgridError};
use crate::templates::names::normalize_locale;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Flat message table for one locale.
pub type LocaleTable = HashMap<String, String>;

/// All locales known to the registry.
///
/// Codes are stored lower-cased. An empty code resolves to an empty table so
/// that templates can be built without localization.
#[derive(Debug, Clone, Default)]
pub struct LocaleCatalog {
    locales: BTreeMap<String, Arc<LocaleTable>>,
}

impl LocaleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the table of a locale.
    pub fn insert(&mut self, code: &str, table: LocaleTable) {
        self.locales.insert(normalize_locale(code), Arc::new(table));
    }

    /// Resolve the message table for a locale code.
    pub fn resolve(&self, code: &str) -> Result<Arc<LocaleTable>> {
        if code.is_empty() {
            return Ok(Arc::new(LocaleTable::new()));
        }
        let code = normalize_locale(code);
        self.locales
            .get(&code)
            .cloned()
            .ok_or(TemplgridError::UnknownLocale(code))
    }

    /// Locale codes in sorted order.
    pub fn codes(&self) -> Vec<String> {
        self.locales.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.locales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }
}

impl FromIterator<(String, LocaleTable)> for LocaleCatalog {
    fn from_iter<I: IntoIterator<Item = (String, LocaleTable)>>(iter: I) -> Self {
        let mut catalog = LocaleCatalog::new();
        for (code, table) in iter {
            catalog.insert(&code, table);
        }
        catalog
    }
}

//! In-memory template store
//!
//! Behaves like the remote API (identifiers, version history, active flag)
//! without any network. Used for dry runs and integration tests; every call
//! is recorded so a test can assert on the exact traffic.

use crate::error::{Result, TemplgridError};
use crate::sync::store::{RemoteTemplateRecord, TemplateStore, VersionId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

/// A call received by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List,
    Create { name: String },
    CreateVersion { internal_id: String, activate: bool },
    Delete { internal_id: String },
}

#[derive(Debug, Default)]
struct Inner {
    // keyed by internal id
    templates: BTreeMap<String, RemoteTemplateRecord>,
    calls: Vec<StoreCall>,
    failing: HashSet<String>,
    next_id: u64,
}

impl Inner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check(&self, key: &str) -> Result<()> {
        if self.failing.contains(key) {
            Err(TemplgridError::RemoteCall {
                status: 500,
                body: format!("injected failure for {}", key),
            })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a template with one active version.
    pub fn seed(&self, name: &str, subject: &str, html: &str) -> String {
        let mut inner = self.inner.lock();
        let internal_id = inner.next_id("tpl");
        let version = inner.next_id("ver");
        inner.templates.insert(
            internal_id.clone(),
            RemoteTemplateRecord {
                name: name.to_string(),
                internal_id: internal_id.clone(),
                active_version: Some(version.clone()),
                versions: vec![version],
                subject: subject.to_string(),
                html: html.to_string(),
            },
        );
        internal_id
    }

    /// Make every call touching `key` (a template name or internal id) fail.
    pub fn fail_on(&self, key: impl Into<String>) {
        self.inner.lock().failing.insert(key.into());
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    /// Calls other than `List`.
    pub fn write_calls(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| *call != StoreCall::List)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn get(&self, name: &str) -> Option<RemoteTemplateRecord> {
        self.inner
            .lock()
            .templates
            .values()
            .find(|record| record.name == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock()
            .templates
            .values()
            .map(|record| record.name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn list(&self) -> Result<Vec<RemoteTemplateRecord>> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::List);
        Ok(inner.templates.values().cloned().collect())
    }

    async fn create(&self, name: &str) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Create {
            name: name.to_string(),
        });
        inner.check(name)?;

        let internal_id = inner.next_id("tpl");
        inner.templates.insert(
            internal_id.clone(),
            RemoteTemplateRecord {
                name: name.to_string(),
                internal_id: internal_id.clone(),
                ..Default::default()
            },
        );
        Ok(internal_id)
    }

    async fn create_version(
        &self,
        internal_id: &str,
        subject: &str,
        html: &str,
        activate: bool,
    ) -> Result<VersionId> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::CreateVersion {
            internal_id: internal_id.to_string(),
            activate,
        });
        inner.check(internal_id)?;
        if let Some(name) = inner.templates.get(internal_id).map(|r| r.name.clone()) {
            inner.check(&name)?;
        }

        let version = inner.next_id("ver");
        let record = inner
            .templates
            .get_mut(internal_id)
            .ok_or_else(|| TemplgridError::RemoteCall {
                status: 404,
                body: format!("template {} not found", internal_id),
            })?;

        record.versions.push(version.clone());
        if activate {
            record.active_version = Some(version.clone());
        }
        record.subject = subject.to_string();
        record.html = html.to_string();

        Ok(version)
    }

    async fn delete(&self, internal_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Delete {
            internal_id: internal_id.to_string(),
        });
        inner.check(internal_id)?;

        match inner.templates.remove(internal_id) {
            Some(_) => Ok(()),
            None => Err(TemplgridError::RemoteCall {
                status: 404,
                body: format!("template {} not found", internal_id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_version_history_and_activation() {
        let store = MemoryStore::new();
        let id = store.create("Welcome").await.unwrap();

        let v1 = store.create_version(&id, "s", "<p>1</p>", false).await.unwrap();
        let v2 = store.create_version(&id, "s", "<p>2</p>", true).await.unwrap();

        let record = store.get("Welcome").unwrap();
        assert_eq!(record.versions, vec![v1, v2.clone()]);
        assert_eq!(record.active_version, Some(v2));
        assert_eq!(record.html, "<p>2</p>");
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.fail_on("Broken");

        let err = store.create("Broken").await.unwrap_err();
        assert!(matches!(err, TemplgridError::RemoteCall { status: 500, .. }));
        assert!(store.get("Broken").is_none());
        assert_eq!(
            store.calls(),
            vec![StoreCall::Create {
                name: "Broken".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let store = MemoryStore::new();
        let err = store.delete("nope").await.unwrap_err();
        assert!(matches!(err, TemplgridError::RemoteCall { status: 404, .. }));
    }
}

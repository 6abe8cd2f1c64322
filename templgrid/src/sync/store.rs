//! Remote template store abstraction

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier of a template version on the remote store.
pub type VersionId = String;

/// A template as last known from the remote store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTemplateRecord {
    /// Template name, unique on the remote side
    pub name: String,
    /// Remote identifier, empty until the template has been created
    pub internal_id: String,
    /// Version currently served by the remote store
    pub active_version: Option<VersionId>,
    /// Version history, oldest first
    pub versions: Vec<VersionId>,
    /// Subject of the latest version
    pub subject: String,
    /// HTML of the latest version
    pub html: String,
}

impl RemoteTemplateRecord {
    /// Byte-for-byte comparison with freshly rendered content.
    pub fn differs_from(&self, subject: &str, html: &str) -> bool {
        self.subject.as_bytes() != subject.as_bytes() || self.html.as_bytes() != html.as_bytes()
    }
}

/// Client of a remote template store.
///
/// Calls are request/response; a non-success answer is reported as
/// `TemplgridError::RemoteCall`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch every template with its latest content.
    async fn list(&self) -> Result<Vec<RemoteTemplateRecord>>;

    /// Create an empty template and return its remote identifier.
    async fn create(&self, name: &str) -> Result<String>;

    /// Add a new version carrying `subject` and `html`.
    async fn create_version(
        &self,
        internal_id: &str,
        subject: &str,
        html: &str,
        activate: bool,
    ) -> Result<VersionId>;

    /// Delete a template together with its versions.
    async fn delete(&self, internal_id: &str) -> Result<()>;
}

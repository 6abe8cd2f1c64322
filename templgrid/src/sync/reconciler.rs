//! Remote synchronization engine
//!
//! One pass fetches the remote store, classifies every template name and
//! issues the minimal set of writes:
//!
//! ```text
//! New        -> create template -> create version
//! Changed    -> create version (history is never edited in place)
//! Unchanged  -> no call
//! Orphaned   -> delete (only with delete_not_listed)
//! Duplicate  -> delete the extra copy (only with delete_not_listed)
//! ```
//!
//! A failed call aborts only the chain of the template it belongs to; the
//! pass continues and every failure is reported in [`SyncReport`].

use crate::error::{Result, TemplgridError};
use crate::sync::plan::{index_by_name, ReconciliationPlan};
use crate::sync::store::{RemoteTemplateRecord, TemplateStore};
use crate::templates::BuildResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reconciler behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Delete remote templates absent from the desired set
    pub delete_not_listed: bool,
    /// Activate versions as they are created
    pub activate_new_version: bool,
}

/// Remote operation chain attempted for a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncAction::Create => "create",
            SyncAction::Update => "update",
            SyncAction::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A template whose operation chain failed.
#[derive(Debug)]
pub struct SyncFailure {
    pub name: String,
    pub action: SyncAction,
    pub error: TemplgridError,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} failed: {}", self.action, self.name, self.error)
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub plan: ReconciliationPlan,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    /// One entry per deleted remote template, duplicates included
    pub deleted: Vec<String>,
    /// Orphans and duplicate copies left untouched because deletion is disabled
    pub kept: Vec<String>,
    pub failures: Vec<SyncFailure>,
    /// Set when the pass stopped early on cancellation
    pub cancelled: bool,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Number of templates that received a remote write.
    pub fn changes(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// Converges a remote template store towards a desired set of templates.
pub struct Reconciler {
    store: Arc<dyn TemplateStore>,
    options: SyncOptions,
    records: BTreeMap<String, RemoteTemplateRecord>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TemplateStore>, options: SyncOptions) -> Self {
        Self {
            store,
            options,
            records: BTreeMap::new(),
        }
    }

    /// Remote records as known after the last pass.
    pub fn records(&self) -> &BTreeMap<String, RemoteTemplateRecord> {
        &self.records
    }

    /// Run one full pass.
    ///
    /// Only the initial listing can fail the whole pass. Cancellation is
    /// checked between templates, so a create + version chain always
    /// completes as a unit.
    pub async fn reconcile(
        &mut self,
        desired: &BTreeMap<String, BuildResult>,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let (records, duplicates) = index_by_name(self.store.list().await?);
        self.records = records;

        let mut plan = ReconciliationPlan::compute(desired, &self.records);
        plan.duplicates = duplicates;
        info!(
            "Sync plan: {} new, {} changed, {} unchanged, {} orphaned, {} duplicated",
            plan.new.len(),
            plan.changed.len(),
            plan.unchanged.len(),
            plan.orphaned.len(),
            plan.duplicates.len()
        );
        for name in &plan.unchanged {
            debug!("Template {} is up to date, skipping", name);
        }

        let mut report = SyncReport {
            plan: plan.clone(),
            ..Default::default()
        };

        for name in &plan.new {
            if cancelled(cancel, &mut report) {
                return Ok(report);
            }
            match self.create(name, &desired[name]).await {
                Ok(()) => report.created.push(name.clone()),
                Err(e) => fail(&mut report, name, SyncAction::Create, e),
            }
        }

        for name in &plan.changed {
            if cancelled(cancel, &mut report) {
                return Ok(report);
            }
            match self.update(name, &desired[name]).await {
                Ok(()) => report.updated.push(name.clone()),
                Err(e) => fail(&mut report, name, SyncAction::Update, e),
            }
        }

        for name in &plan.orphaned {
            if !self.options.delete_not_listed {
                warn!("Template {} exists remotely but is not listed, keeping it", name);
                report.kept.push(name.clone());
                continue;
            }
            if cancelled(cancel, &mut report) {
                return Ok(report);
            }
            match self.delete(name).await {
                Ok(()) => report.deleted.push(name.clone()),
                Err(e) => fail(&mut report, name, SyncAction::Delete, e),
            }
        }

        for copy in &plan.duplicates {
            if !self.options.delete_not_listed {
                warn!(
                    "Template {} has a duplicate remote copy ({}), keeping it",
                    copy.name, copy.internal_id
                );
                report.kept.push(copy.name.clone());
                continue;
            }
            if cancelled(cancel, &mut report) {
                return Ok(report);
            }
            info!("Deleting duplicate remote template {} ({})", copy.name, copy.internal_id);
            match self.store.delete(&copy.internal_id).await {
                Ok(()) => report.deleted.push(copy.name.clone()),
                Err(e) => fail(&mut report, &copy.name, SyncAction::Delete, e),
            }
        }

        info!(
            "Sync finished: {} created, {} updated, {} deleted, {} failed",
            report.created.len(),
            report.updated.len(),
            report.deleted.len(),
            report.failures.len()
        );

        Ok(report)
    }

    async fn create(&mut self, name: &str, rendered: &BuildResult) -> Result<()> {
        info!("Creating remote template {}", name);
        let internal_id = self.store.create(name).await?;

        self.records.insert(
            name.to_string(),
            RemoteTemplateRecord {
                name: name.to_string(),
                internal_id,
                ..Default::default()
            },
        );

        self.push_version(name, rendered).await
    }

    async fn update(&mut self, name: &str, rendered: &BuildResult) -> Result<()> {
        info!("Template {} changed, pushing a new version", name);
        self.push_version(name, rendered).await
    }

    async fn push_version(&mut self, name: &str, rendered: &BuildResult) -> Result<()> {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| TemplgridError::UnknownTemplate(name.to_string()))?;

        if record.internal_id.is_empty() {
            return Err(TemplgridError::InvalidRequest(format!(
                "template {} has no remote identifier",
                name
            )));
        }

        let version = self
            .store
            .create_version(
                &record.internal_id,
                &rendered.subject,
                &rendered.html,
                self.options.activate_new_version,
            )
            .await?;

        debug!("Template {} got version {}", name, version);

        if self.options.activate_new_version {
            record.active_version = Some(version.clone());
        }
        record.versions.push(version);
        record.subject = rendered.subject.clone();
        record.html = rendered.html.clone();

        Ok(())
    }

    async fn delete(&mut self, name: &str) -> Result<()> {
        let internal_id = self
            .records
            .get(name)
            .map(|record| record.internal_id.clone())
            .unwrap_or_default();

        if internal_id.is_empty() {
            warn!("Template {} has no remote identifier, dropping bookkeeping only", name);
        } else {
            info!("Deleting remote template {} ({})", name, internal_id);
            self.store.delete(&internal_id).await?;
        }

        self.records.remove(name);
        Ok(())
    }
}

fn cancelled(cancel: &CancellationToken, report: &mut SyncReport) -> bool {
    if cancel.is_cancelled() {
        warn!("Sync cancelled before completion");
        report.cancelled = true;
    }
    report.cancelled
}

fn fail(report: &mut SyncReport, name: &str, action: SyncAction, error: TemplgridError) {
    error!("Failed to {} template {}: {}", action, name, error);
    report.failures.push(SyncFailure {
        name: name.to_string(),
        action,
        error,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::store::MockTemplateStore;
    use mockall::predicate::eq;

    fn rendered(html: &str) -> BuildResult {
        BuildResult {
            subject: "subject".to_string(),
            html: html.to_string(),
        }
    }

    fn record(name: &str, id: &str, html: &str) -> RemoteTemplateRecord {
        RemoteTemplateRecord {
            name: name.to_string(),
            internal_id: id.to_string(),
            subject: "subject".to_string(),
            html: html.to_string(),
            versions: vec!["v1".to_string()],
            active_version: Some("v1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_changed_and_new_without_deletion() {
        let mut store = MockTemplateStore::new();
        store
            .expect_list()
            .times(1)
            .returning(|| Ok(vec![record("A", "id-a", "old")]));
        store
            .expect_create()
            .with(eq("B"))
            .times(1)
            .returning(|_| Ok("id-b".to_string()));
        store
            .expect_create_version()
            .with(eq("id-b"), eq("subject"), eq("x"), eq(false))
            .times(1)
            .returning(|_, _, _, _| Ok("v-b1".to_string()));
        store
            .expect_create_version()
            .with(eq("id-a"), eq("subject"), eq("new"), eq(false))
            .times(1)
            .returning(|_, _, _, _| Ok("v-a2".to_string()));
        store.expect_delete().never();

        let mut reconciler = Reconciler::new(Arc::new(store), SyncOptions::default());
        let desired = BTreeMap::from([
            ("A".to_string(), rendered("new")),
            ("B".to_string(), rendered("x")),
        ]);

        let report = reconciler
            .reconcile(&desired, &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.created, vec!["B"]);
        assert_eq!(report.updated, vec!["A"]);
        assert!(report.deleted.is_empty());

        let a = &reconciler.records()["A"];
        assert_eq!(a.versions, vec!["v1", "v-a2"]);
        assert_eq!(a.active_version.as_deref(), Some("v1"));
        assert_eq!(reconciler.records()["B"].internal_id, "id-b");
    }

    #[tokio::test]
    async fn test_orphan_deleted_when_enabled() {
        let mut store = MockTemplateStore::new();
        store
            .expect_list()
            .returning(|| Ok(vec![record("A", "id-a", "old")]));
        store
            .expect_create()
            .returning(|_| Ok("id-b".to_string()));
        store
            .expect_create_version()
            .with(eq("id-b"), eq("subject"), eq("x"), eq(true))
            .returning(|_, _, _, _| Ok("v-b1".to_string()));
        store
            .expect_delete()
            .with(eq("id-a"))
            .times(1)
            .returning(|_| Ok(()));

        let options = SyncOptions {
            delete_not_listed: true,
            activate_new_version: true,
        };
        let mut reconciler = Reconciler::new(Arc::new(store), options);
        let desired = BTreeMap::from([("B".to_string(), rendered("x"))]);

        let report = reconciler
            .reconcile(&desired, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.deleted, vec!["A"]);
        assert_eq!(report.created, vec!["B"]);
        assert!(!reconciler.records().contains_key("A"));
        assert_eq!(
            reconciler.records()["B"].active_version.as_deref(),
            Some("v-b1")
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_pass() {
        let mut store = MockTemplateStore::new();
        store.expect_list().returning(|| Ok(Vec::new()));
        store
            .expect_create()
            .with(eq("A"))
            .returning(|_| {
                Err(TemplgridError::RemoteCall {
                    status: 500,
                    body: "boom".to_string(),
                })
            });
        store
            .expect_create()
            .with(eq("B"))
            .returning(|_| Ok("id-b".to_string()));
        store
            .expect_create_version()
            .times(1)
            .returning(|_, _, _, _| Ok("v-b1".to_string()));

        let mut reconciler = Reconciler::new(Arc::new(store), SyncOptions::default());
        let desired = BTreeMap::from([
            ("A".to_string(), rendered("a")),
            ("B".to_string(), rendered("b")),
        ]);

        let report = reconciler
            .reconcile(&desired, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.created, vec!["B"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "A");
        assert_eq!(report.failures[0].action, SyncAction::Create);
        assert!(matches!(
            report.failures[0].error,
            TemplgridError::RemoteCall { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_list_failure_fails_the_pass() {
        let mut store = MockTemplateStore::new();
        store.expect_list().returning(|| {
            Err(TemplgridError::RemoteCall {
                status: 401,
                body: "unauthorized".to_string(),
            })
        });

        let mut reconciler = Reconciler::new(Arc::new(store), SyncOptions::default());
        let result = reconciler
            .reconcile(&BTreeMap::new(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(TemplgridError::RemoteCall { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_cancelled_pass_issues_no_writes() {
        let mut store = MockTemplateStore::new();
        store.expect_list().returning(|| Ok(Vec::new()));
        store.expect_create().never();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut reconciler = Reconciler::new(Arc::new(store), SyncOptions::default());
        let desired = BTreeMap::from([("A".to_string(), rendered("a"))]);
        let report = reconciler.reconcile(&desired, &cancel).await.unwrap();

        assert!(report.cancelled);
        assert!(report.created.is_empty());
    }
}

//! Classification of template names for one reconciliation pass

use crate::sync::store::RemoteTemplateRecord;
use crate::templates::BuildResult;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Where a template name stands relative to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateState {
    /// Desired locally, absent remotely
    New,
    /// Present remotely with different subject or HTML
    Changed,
    /// Present remotely with byte-identical content
    Unchanged,
    /// Present remotely, not desired locally
    Orphaned,
}

/// Extra remote template carrying a name already held by another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateCopy {
    pub name: String,
    pub internal_id: String,
}

/// Partition of every known name into exactly one state.
///
/// When the remote store holds several templates with the same name, the
/// first one listed is classified and the others land in `duplicates`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub new: Vec<String>,
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
    pub orphaned: Vec<String>,
    pub duplicates: Vec<DuplicateCopy>,
}

/// Index remote records by name, keeping the first record of each name.
pub fn index_by_name(
    records: Vec<RemoteTemplateRecord>,
) -> (BTreeMap<String, RemoteTemplateRecord>, Vec<DuplicateCopy>) {
    let mut by_name = BTreeMap::new();
    let mut duplicates = Vec::new();

    for record in records {
        match by_name.entry(record.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(_) => duplicates.push(DuplicateCopy {
                name: record.name,
                internal_id: record.internal_id,
            }),
        }
    }

    (by_name, duplicates)
}

impl ReconciliationPlan {
    /// Compare the desired set against the remote snapshot.
    pub fn compute(
        desired: &BTreeMap<String, BuildResult>,
        remote: &BTreeMap<String, RemoteTemplateRecord>,
    ) -> Self {
        let mut plan = ReconciliationPlan::default();

        for (name, rendered) in desired {
            match remote.get(name) {
                None => plan.new.push(name.clone()),
                Some(record) if record.differs_from(&rendered.subject, &rendered.html) => {
                    plan.changed.push(name.clone())
                }
                Some(_) => plan.unchanged.push(name.clone()),
            }
        }

        plan.orphaned = remote
            .keys()
            .filter(|name| !desired.contains_key(*name))
            .cloned()
            .collect();

        plan
    }

    pub fn state_of(&self, name: &str) -> Option<TemplateState> {
        let contains = |names: &[String]| names.iter().any(|n| n == name);
        if contains(&self.new) {
            Some(TemplateState::New)
        } else if contains(&self.changed) {
            Some(TemplateState::Changed)
        } else if contains(&self.unchanged) {
            Some(TemplateState::Unchanged)
        } else if contains(&self.orphaned) {
            Some(TemplateState::Orphaned)
        } else {
            None
        }
    }

    /// True when the pass would not issue any remote write.
    pub fn is_noop(&self, delete_orphans: bool) -> bool {
        self.new.is_empty()
            && self.changed.is_empty()
            && (!delete_orphans || (self.orphaned.is_empty() && self.duplicates.is_empty()))
    }
}

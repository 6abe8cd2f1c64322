//! Synchronization of rendered templates with a remote template store

pub mod memory;
pub mod plan;
pub mod reconciler;
pub mod sendgrid;
pub mod store;

pub use memory::{MemoryStore, StoreCall};
pub use plan::{DuplicateCopy, ReconciliationPlan, TemplateState};
pub use reconciler::{Reconciler, SyncAction, SyncFailure, SyncOptions, SyncReport};
pub use sendgrid::SendGridStore;
pub use store::{RemoteTemplateRecord, TemplateStore, VersionId};

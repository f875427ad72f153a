//! Bulk export/import of resource payloads to and from a directory tree.

use std::path::PathBuf;

use crate::model::resource::ResourceId;

pub mod export;
pub mod import;
pub mod naming;
pub mod progress;
pub mod worker;

pub use export::{export, export_resource};
pub use import::{CandidateSet, import_all, import_resource};
pub use naming::OutputName;
pub use progress::{CancelToken, NoProgress, ProgressEvent, ProgressSink};
pub use worker::{
    SharedArchive, TransferHandle, spawn_export, spawn_export_with, spawn_import, spawn_import_with,
};

#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    /// Only export resources whose file name ends with this suffix.
    pub filter_suffix: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ImportOptions {
    /// Force compression on or off; `None` keeps each fragment's current mode.
    pub compress: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Name did not end with the export filter.
    Filtered,
    /// No candidate file carried the resource's name.
    NoMatch,
    /// The pass was cancelled before reaching the resource.
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutcomeStatus {
    Applied,
    Skipped(SkipReason),
    Failed { reason: String },
}

#[derive(Clone, Debug)]
pub struct ResourceOutcome {
    pub id: ResourceId,
    pub identifier: String,
    pub status: OutcomeStatus,
    /// Files written (export) or read (import).
    pub files: Vec<PathBuf>,
}

/// Per-resource results of one bulk pass, in archive order.
#[derive(Clone, Debug, Default)]
pub struct TransferReport {
    pub outcomes: Vec<ResourceOutcome>,
    pub cancelled: bool,
}

impl TransferReport {
    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Applied))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            OutcomeStatus::Failed { reason } => Some((o.identifier.as_str(), reason.as_str())),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub(crate) fn push(&mut self, id: ResourceId, identifier: &str, status: OutcomeStatus, files: Vec<PathBuf>) {
        self.outcomes.push(ResourceOutcome {
            id,
            identifier: identifier.to_string(),
            status,
            files,
        });
    }
}

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::naming::OutputName;
use super::progress::{CancelToken, ProgressEvent, ProgressSink};
use super::{ImportOptions, OutcomeStatus, SkipReason, TransferReport};
use crate::error::{ErpError, Result};
use crate::model::archive::ArchiveFile;
use crate::model::resource::ResourceId;

#[derive(Clone, Debug)]
struct Candidate {
    path: PathBuf,
    /// Path below the import root, or the full path when unrooted.
    relative: PathBuf,
}

/// Candidate files for an import, looked up by the relative path a resource
/// would have been exported to.
///
/// A rooted set only matches a file at exactly that path below its root. An
/// unrooted set matches on trailing path components and prefers the
/// shortest matching path.
#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
    by_file_name: HashMap<String, Vec<Candidate>>,
    rooted: bool,
}

impl CandidateSet {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut set = Self::default();
        for file in files {
            let path = file.into();
            set.insert(path.clone(), path);
        }
        set
    }

    /// Candidates gathered under `root`; files outside it are ignored.
    pub fn rooted<I, P>(root: &Path, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut set = Self {
            rooted: true,
            ..Self::default()
        };
        for file in files {
            let path = file.into();
            if let Ok(relative) = path.strip_prefix(root) {
                let relative = relative.to_path_buf();
                set.insert(path, relative);
            }
        }
        set
    }

    fn insert(&mut self, path: PathBuf, relative: PathBuf) {
        if let Some(name) = relative.file_name().map(OsStr::to_string_lossy) {
            self.by_file_name
                .entry(name.into_owned())
                .or_default()
                .push(Candidate { path, relative });
        }
    }

    pub fn len(&self) -> usize {
        self.by_file_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file_name.is_empty()
    }

    pub fn lookup(&self, relative: &Path) -> Option<&Path> {
        let name = relative.file_name()?.to_string_lossy();
        let wanted = normal_components(relative);
        self.by_file_name
            .get(name.as_ref())?
            .iter()
            .filter_map(|cand| {
                let have = normal_components(&cand.relative);
                let hit = if self.rooted {
                    have == wanted
                } else {
                    have.ends_with(&wanted)
                };
                hit.then_some((have.len(), cand))
            })
            .min_by_key(|(depth, _)| *depth)
            .map(|(_, cand)| cand.path.as_path())
    }
}

fn normal_components(p: &Path) -> Vec<&OsStr> {
    p.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .collect()
}

enum ImportOutcome {
    Applied(Vec<PathBuf>),
    NoMatch,
}

/// Read the matched files for one resource and swap its payloads in.
/// Nothing is replaced unless every matched file was read and encoded.
fn import_one(
    archive: &mut ArchiveFile,
    id: ResourceId,
    candidates: &CandidateSet,
    opts: &ImportOptions,
) -> Result<ImportOutcome> {
    let codec = *archive.codec_options();
    let res = archive
        .get(id)
        .ok_or_else(|| ErpError::NotFound(format!("resource {id}")))?;
    let name = OutputName::for_resource(res)?;

    let mut staged = Vec::new();
    let mut files = Vec::new();
    for (i, frag) in res.fragments().iter().enumerate() {
        let Some(path) = candidates.lookup(&name.fragment_path(i)) else {
            continue;
        };
        let bytes = fs::read(path)?;
        let mut replacement = frag.clone();
        replacement.set_data_with(&bytes, opts.compress.unwrap_or(frag.is_compressed()), &codec)?;
        staged.push((i, replacement));
        files.push(path.to_path_buf());
    }
    if staged.is_empty() {
        return Ok(ImportOutcome::NoMatch);
    }

    for (i, frag) in staged {
        archive.replace_fragment(id, i, frag)?;
    }
    Ok(ImportOutcome::Applied(files))
}

/// Import one resource from `files`. Returns `false` when no file matched.
pub fn import_resource(
    archive: &mut ArchiveFile,
    id: ResourceId,
    files: &[PathBuf],
    opts: &ImportOptions,
) -> Result<bool> {
    let candidates = CandidateSet::new(files.iter().cloned());
    match import_one(archive, id, &candidates, opts)? {
        ImportOutcome::Applied(_) => Ok(true),
        ImportOutcome::NoMatch => Ok(false),
    }
}

/// Import every resource that has a matching candidate file. A bad file is
/// recorded against its resource and the pass moves on. Offsets are
/// recomputed once at the end when anything changed.
pub fn import_all(
    archive: &mut ArchiveFile,
    candidates: &CandidateSet,
    sink: &mut dyn ProgressSink,
    cancel: &CancelToken,
    opts: &ImportOptions,
) -> Result<TransferReport> {
    let ids = archive.ids();
    let total = ids.len();
    let mut report = TransferReport::default();

    for (i, id) in ids.iter().copied().enumerate() {
        let identifier = archive
            .get(id)
            .map(|r| r.identifier().to_string())
            .ok_or_else(|| ErpError::Consistency(format!("resource {id} vanished during import")))?;

        if cancel.is_cancelled() {
            report.cancelled = true;
            for rest in &ids[i..] {
                let rest_identifier = archive.get(*rest).map(|r| r.identifier()).unwrap_or_default();
                report.push(*rest, rest_identifier, OutcomeStatus::Skipped(SkipReason::Cancelled), Vec::new());
            }
            sink.on_progress(&ProgressEvent::new("Import cancelled", i, total));
            break;
        }

        let status = match import_one(archive, id, candidates, opts) {
            Ok(ImportOutcome::Applied(files)) => {
                debug!(identifier = %identifier, files = files.len(), "imported");
                report.push(id, &identifier, OutcomeStatus::Applied, files);
                format!("Imported {identifier}")
            }
            Ok(ImportOutcome::NoMatch) => {
                report.push(id, &identifier, OutcomeStatus::Skipped(SkipReason::NoMatch), Vec::new());
                format!("Skipped {identifier}")
            }
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "import failed");
                report.push(id, &identifier, OutcomeStatus::Failed { reason: e.to_string() }, Vec::new());
                format!("Failed to import {identifier}")
            }
        };
        sink.on_progress(&ProgressEvent::new(status, i + 1, total));
    }

    if report.applied() > 0 {
        archive.update_offsets();
    }
    info!(
        applied = report.applied(),
        skipped = report.skipped(),
        failed = report.failed(),
        cancelled = report.cancelled,
        "import finished"
    );
    Ok(report)
}

//! Runs an export or import pass on its own thread.
//!
//! The worker holds the archive lock for the whole pass, so edits and other
//! passes wait until it finishes. Progress comes back over a channel that the
//! launching side drains while it waits.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::debug;

use super::import::CandidateSet;
use super::progress::{CancelToken, ProgressEvent, ProgressSink};
use super::{ExportOptions, ImportOptions, TransferReport};
use crate::error::{ErpError, Result};
use crate::model::archive::ArchiveFile;

pub type SharedArchive = Arc<Mutex<ArchiveFile>>;

pub struct TransferHandle {
    events: Receiver<ProgressEvent>,
    join: JoinHandle<Result<TransferReport>>,
    cancel: CancelToken,
}

impl TransferHandle {
    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the pass ends. Undelivered events are dropped.
    pub fn join(self) -> Result<TransferReport> {
        drop(self.events);
        self.join
            .join()
            .map_err(|_| ErpError::Consistency("transfer worker panicked".into()))?
    }

    /// Feed every event to `on_event` as it arrives, then return the report.
    pub fn wait_with(self, mut on_event: impl FnMut(&ProgressEvent)) -> Result<TransferReport> {
        for event in self.events.iter() {
            on_event(&event);
        }
        self.join
            .join()
            .map_err(|_| ErpError::Consistency("transfer worker panicked".into()))?
    }
}

/// Forwards events to the handle. Sends fail quietly once the receiver is
/// dropped, which happens when the caller only joins.
struct ChannelSink(Sender<ProgressEvent>);

impl ProgressSink for ChannelSink {
    fn on_progress(&mut self, event: &ProgressEvent) {
        let _ = self.0.send(event.clone());
    }
}

fn spawn<F>(name: &str, cancel: CancelToken, work: F) -> Result<TransferHandle>
where
    F: FnOnce(&mut ChannelSink, &CancelToken) -> Result<TransferReport> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker_cancel = cancel.clone();
    let join = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || work(&mut ChannelSink(tx), &worker_cancel))?;
    debug!(worker = name, "transfer started");
    Ok(TransferHandle {
        events: rx,
        join,
        cancel,
    })
}

fn lock(archive: &SharedArchive) -> Result<std::sync::MutexGuard<'_, ArchiveFile>> {
    archive
        .lock()
        .map_err(|_| ErpError::Consistency("archive lock poisoned".into()))
}

pub fn spawn_export(
    archive: SharedArchive,
    dest: PathBuf,
    opts: ExportOptions,
) -> Result<TransferHandle> {
    spawn_export_with(archive, dest, opts, CancelToken::new())
}

pub fn spawn_export_with(
    archive: SharedArchive,
    dest: PathBuf,
    opts: ExportOptions,
    cancel: CancelToken,
) -> Result<TransferHandle> {
    spawn("erp-export", cancel, move |sink, cancel| {
        let guard = lock(&archive)?;
        super::export::export(&guard, &dest, sink, cancel, &opts)
    })
}

pub fn spawn_import(
    archive: SharedArchive,
    candidates: CandidateSet,
    opts: ImportOptions,
) -> Result<TransferHandle> {
    spawn_import_with(archive, candidates, opts, CancelToken::new())
}

pub fn spawn_import_with(
    archive: SharedArchive,
    candidates: CandidateSet,
    opts: ImportOptions,
    cancel: CancelToken,
) -> Result<TransferHandle> {
    spawn("erp-import", cancel, move |sink, cancel| {
        let mut guard = lock(&archive)?;
        super::import::import_all(&mut guard, &candidates, sink, cancel, &opts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fragment::Fragment;
    use crate::model::resource::Resource;

    fn shared(ids: &[&str]) -> SharedArchive {
        let mut a = ArchiveFile::new();
        for id in ids {
            let frag = Fragment::new("temp", id.as_bytes(), true).unwrap();
            a.add_resource(Resource::new(*id, "f", "Material", frag));
        }
        a.update_offsets();
        Arc::new(Mutex::new(a))
    }

    #[test]
    fn export_streams_progress_back() {
        let archive = shared(&["eaid://x/a.mat", "eaid://x/b.mat"]);
        let tmp = tempfile::tempdir().unwrap();
        let handle =
            spawn_export(archive, tmp.path().to_path_buf(), ExportOptions::default()).unwrap();
        let mut seen = Vec::new();
        let report = handle.wait_with(|e| seen.push(e.current)).unwrap();
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(report.applied(), 2);
        assert!(tmp.path().join("x").join("b.mat").is_file());
    }

    #[test]
    fn import_edits_the_shared_archive() {
        let archive = shared(&["eaid://x/a.mat"]);
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("x").join("a.mat");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"replaced").unwrap();

        let handle = spawn_import(
            Arc::clone(&archive),
            CandidateSet::new([file]),
            ImportOptions::default(),
        )
        .unwrap();
        let report = handle.join().unwrap();
        assert_eq!(report.applied(), 1);

        let guard = archive.lock().unwrap();
        let data = guard.find("eaid://x/a.mat").unwrap().fragments()[0]
            .data_array(true)
            .unwrap()
            .into_owned();
        assert_eq!(data, b"replaced");
        assert!(!guard.offsets_stale());
    }

    #[test]
    fn pre_cancelled_pass_skips_all() {
        let archive = shared(&["eaid://x/a.mat", "eaid://x/b.mat"]);
        let tmp = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let handle = spawn_export_with(
            archive,
            tmp.path().to_path_buf(),
            ExportOptions::default(),
            cancel,
        )
        .unwrap();
        let report = handle.join().unwrap();
        assert!(report.cancelled);
        assert_eq!(report.skipped(), 2);
    }
}

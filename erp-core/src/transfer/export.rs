use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::naming::OutputName;
use super::progress::{CancelToken, ProgressEvent, ProgressSink};
use super::{ExportOptions, OutcomeStatus, SkipReason, TransferReport};
use crate::error::Result;
use crate::model::archive::ArchiveFile;
use crate::model::resource::Resource;

/// Write every fragment of one resource under `dest`, returning the files
/// written. The first failure is returned as is.
pub fn export_resource(resource: &Resource, dest: &Path) -> Result<Vec<PathBuf>> {
    let name = OutputName::for_resource(resource)?;

    // Decode everything first so a corrupt fragment leaves no partial output.
    let payloads = resource
        .fragments()
        .iter()
        .map(|f| f.data_array(true))
        .collect::<Result<Vec<_>>>()?;

    let mut written = Vec::with_capacity(payloads.len());
    for (i, data) in payloads.iter().enumerate() {
        let outp = dest.join(name.fragment_path(i));
        if let Some(parent) = outp.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&outp)?;
        out.write_all(data)?;
        out.flush()?;
        written.push(outp);
    }
    Ok(written)
}

/// Export the whole archive in order. Per-resource failures are recorded in
/// the report; only an unusable destination fails the call.
///
/// An output path is written once per pass. A later resource that maps onto a
/// path already written is recorded as failed and its files are not written.
pub fn export(
    archive: &ArchiveFile,
    dest: &Path,
    sink: &mut dyn ProgressSink,
    cancel: &CancelToken,
    opts: &ExportOptions,
) -> Result<TransferReport> {
    fs::create_dir_all(dest)?;
    let total = archive.len();
    let filter = opts.filter_suffix.as_deref();
    let mut report = TransferReport::default();
    // Relative output path -> identifier that wrote it.
    let mut claimed: HashMap<PathBuf, String> = HashMap::new();

    for (i, res) in archive.resources().iter().enumerate() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            for rest in &archive.resources()[i..] {
                report.push(rest.id(), rest.identifier(), OutcomeStatus::Skipped(SkipReason::Cancelled), Vec::new());
            }
            sink.on_progress(&ProgressEvent::new("Export cancelled", i, total));
            break;
        }

        let status = match OutputName::for_resource(res) {
            Ok(name) if !name.matches_filter(filter) => {
                debug!(identifier = res.identifier(), "filtered out");
                report.push(res.id(), res.identifier(), OutcomeStatus::Skipped(SkipReason::Filtered), Vec::new());
                format!("Skipped {}", res.identifier())
            }
            Ok(name) => {
                let paths: Vec<PathBuf> = (0..res.fragments().len()).map(|n| name.fragment_path(n)).collect();
                let taken = paths
                    .iter()
                    .find_map(|p| claimed.get(p).map(|owner| (p, owner.clone())));
                if let Some((path, owner)) = taken {
                    let reason = format!("output path {} already written by {owner}", path.display());
                    warn!(identifier = res.identifier(), %reason, "export collision");
                    report.push(res.id(), res.identifier(), OutcomeStatus::Failed { reason }, Vec::new());
                    format!("Failed to export {}", res.identifier())
                } else {
                    match export_resource(res, dest) {
                        Ok(files) => {
                            debug!(identifier = res.identifier(), files = files.len(), "exported");
                            for p in paths {
                                claimed.insert(p, res.identifier().to_string());
                            }
                            report.push(res.id(), res.identifier(), OutcomeStatus::Applied, files);
                            format!("Exported {}", res.identifier())
                        }
                        Err(e) => {
                            warn!(identifier = res.identifier(), error = %e, "export failed");
                            report.push(res.id(), res.identifier(), OutcomeStatus::Failed { reason: e.to_string() }, Vec::new());
                            format!("Failed to export {}", res.identifier())
                        }
                    }
                }
            }
            Err(e) => {
                warn!(identifier = res.identifier(), error = %e, "no usable output name");
                report.push(res.id(), res.identifier(), OutcomeStatus::Failed { reason: e.to_string() }, Vec::new());
                format!("Failed to export {}", res.identifier())
            }
        };
        sink.on_progress(&ProgressEvent::new(status, i + 1, total));
    }

    info!(
        applied = report.applied(),
        skipped = report.skipped(),
        failed = report.failed(),
        cancelled = report.cancelled,
        "export finished"
    );
    Ok(report)
}

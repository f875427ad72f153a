use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use walkdir::WalkDir;

use erp_core::error::{ErpError, Result};
use erp_core::transfer::{CandidateSet, TransferHandle, TransferReport, spawn_export, spawn_import};
use erp_core::{
    ArchiveFile, BatchRename, DriverClothesSwap, ExportOptions, IdentifierIndex, ImportOptions,
    ResourceId, SaveOptions, inspect, load, replace_all, save, track_transform, verify,
};

use crate::presentation::cli::SaveTarget;

fn require(archive: &ArchiveFile, identifier: &str) -> Result<ResourceId> {
    archive
        .find_id(identifier)
        .ok_or_else(|| ErpError::NotFound(format!("no resource {identifier}")))
}

/// Load, apply `edit`, lay offsets out again and save.
fn edit_archive(
    archive: &Path,
    target: &SaveTarget,
    edit: impl FnOnce(&mut ArchiveFile) -> Result<()>,
) -> Result<()> {
    let mut a = load(archive)?;
    edit(&mut a)?;
    if a.offsets_stale() {
        a.update_offsets();
    }
    let out = target.out.as_deref().unwrap_or(archive);
    save(
        &a,
        out,
        &SaveOptions {
            deterministic: target.deterministic,
        },
    )?;
    eprintln!("saved {}", out.display());
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Drive a worker to completion, mirroring its events on a progress bar.
fn run_with_bar(handle: TransferHandle) -> Result<TransferReport> {
    let pb = progress_bar();
    let report = handle.wait_with(|ev| {
        pb.set_length(ev.total as u64);
        pb.set_position(ev.current as u64);
        pb.set_message(ev.status.clone());
    });
    pb.finish_and_clear();
    report
}

fn print_report(verb: &str, report: &TransferReport) {
    for (identifier, reason) in report.failures() {
        eprintln!("failed: {identifier}: {reason}");
    }
    eprintln!(
        "{verb}: {} applied, {} skipped, {} failed{}",
        report.applied(),
        report.skipped(),
        report.failed(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
}

pub fn handle_list(archive: PathBuf, long: bool) -> Result<()> {
    let a = load(&archive)?;
    for row in a.rows() {
        println!(
            "{:<8} {:>10} {:>10} {:<12} {:<16} {}",
            row.id.to_string(),
            row.size,
            row.packed_size,
            row.resource_type,
            row.file_name,
            row.identifier
        );
        if long {
            for f in a.fragment_rows(row.id)? {
                println!(
                    "         #{:<3} {:<8} codec={:?} u={} c={} off={}",
                    f.ordinal, f.name, f.codec, f.size, f.packed_size, f.offset
                );
            }
        }
    }
    Ok(())
}

pub fn handle_info(archive: PathBuf) -> Result<()> {
    let info = inspect(&archive)?;
    let a = load(&archive)?;
    let stats = a.stats();
    println!("version:      {}", info.version);
    println!("tool:         {}", info.meta.tool);
    println!(
        "created:      {}",
        info.created_rfc3339().unwrap_or_else(|| "-".into())
    );
    println!("resources:    {}", stats.resources);
    println!(
        "fragments:    {} ({} compressed)",
        stats.fragments, stats.compressed_fragments
    );
    println!(
        "bytes:        {} logical, {} packed ({:.2})",
        stats.logical_bytes, stats.packed_bytes, stats.compression_ratio
    );
    println!("manifest:     {}", info.manifest_digest_hex());
    println!("data:         {}", info.data_digest_hex());

    let index = IdentifierIndex::build(&a);
    for (identifier, count) in index.duplicates() {
        println!("duplicate:    {identifier} x{count}");
    }
    Ok(())
}

pub fn handle_verify(archive: PathBuf) -> Result<()> {
    verify(&archive)?;
    eprintln!("verify: OK");
    Ok(())
}

pub fn handle_export(archive: PathBuf, dest: PathBuf, filter: Option<String>) -> Result<()> {
    let shared = Arc::new(Mutex::new(load(&archive)?));
    let opts = ExportOptions {
        filter_suffix: filter,
    };
    let report = run_with_bar(spawn_export(shared, dest, opts)?)?;
    print_report("export", &report);
    Ok(())
}

fn gather_candidates(src: &Path) -> Result<CandidateSet> {
    let mut files = Vec::new();
    for e in WalkDir::new(src).follow_links(false) {
        let e = e.map_err(|e| std::io::Error::other(e.to_string()))?;
        if e.file_type().is_file() {
            files.push(e.into_path());
        }
    }
    debug!(files = files.len(), "import candidates gathered");
    Ok(CandidateSet::rooted(src, files))
}

pub fn handle_import(
    archive: PathBuf,
    src: PathBuf,
    compress: Option<bool>,
    target: SaveTarget,
) -> Result<()> {
    let candidates = gather_candidates(&src)?;
    let shared = Arc::new(Mutex::new(load(&archive)?));
    let report = run_with_bar(spawn_import(
        Arc::clone(&shared),
        candidates,
        ImportOptions { compress },
    )?)?;
    print_report("import", &report);
    if report.applied() == 0 {
        return Ok(());
    }

    let a = shared
        .lock()
        .map_err(|_| ErpError::Consistency("archive lock poisoned".into()))?;
    let out = target.out.as_deref().unwrap_or(&archive);
    save(
        &a,
        out,
        &SaveOptions {
            deterministic: target.deterministic,
        },
    )?;
    eprintln!("saved {}", out.display());
    Ok(())
}

pub fn handle_rename(
    archive: PathBuf,
    identifier: String,
    new_name: String,
    target: SaveTarget,
) -> Result<()> {
    edit_archive(&archive, &target, |a| {
        let id = require(a, &identifier)?;
        a.rename_resource(id, &new_name)
    })
}

pub fn handle_repath(
    archive: PathBuf,
    identifier: String,
    new_identifier: String,
    force: bool,
    target: SaveTarget,
) -> Result<()> {
    edit_archive(&archive, &target, |a| {
        BatchRename::new(force)
            .rename(identifier, new_identifier)
            .apply(a)?;
        Ok(())
    })
}

pub fn handle_set_type(
    archive: PathBuf,
    identifier: String,
    new_type: String,
    target: SaveTarget,
) -> Result<()> {
    edit_archive(&archive, &target, |a| {
        let id = require(a, &identifier)?;
        a.set_resource_type(id, &new_type)
    })
}

pub fn handle_duplicate(
    archive: PathBuf,
    identifier: String,
    new_identifier: String,
    target: SaveTarget,
) -> Result<()> {
    edit_archive(&archive, &target, |a| {
        let id = require(a, &identifier)?;
        let copy = a.duplicate_resource(id)?;
        a.repath_resource(copy, &new_identifier)?;
        info!(from = %identifier, to = %new_identifier, "resource duplicated");
        Ok(())
    })
}

pub fn handle_fragment_add(archive: PathBuf, identifier: String, target: SaveTarget) -> Result<()> {
    edit_archive(&archive, &target, |a| {
        let id = require(a, &identifier)?;
        let index = a.add_fragment(id)?;
        eprintln!("added fragment #{index} to {identifier}");
        Ok(())
    })
}

pub fn handle_fragment_rm(archive: PathBuf, identifier: String, target: SaveTarget) -> Result<()> {
    edit_archive(&archive, &target, |a| {
        let id = require(a, &identifier)?;
        a.remove_fragment(id)?;
        Ok(())
    })
}

fn apply_batch(a: &mut ArchiveFile, batch: BatchRename) -> Result<()> {
    if batch.is_empty() {
        eprintln!("nothing to rename");
        return Ok(());
    }
    let summary = batch.apply(a)?;
    eprintln!("renamed {} resources", summary.renamed);
    Ok(())
}

pub fn handle_replace_all(
    archive: PathBuf,
    find: String,
    replace: String,
    target: SaveTarget,
) -> Result<()> {
    edit_archive(&archive, &target, |a| {
        let batch = replace_all(a, &find, &replace)?;
        apply_batch(a, batch)
    })
}

pub fn handle_swap_driver(archive: PathBuf, swap: DriverClothesSwap, target: SaveTarget) -> Result<()> {
    edit_archive(&archive, &target, |a| {
        let batch = swap.batch()?;
        apply_batch(a, batch)
    })
}

pub fn handle_transform(archive: PathBuf, target: SaveTarget) -> Result<()> {
    edit_archive(&archive, &target, |a| {
        let batch = track_transform(a)?;
        apply_batch(a, batch)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use erp_core::{Fragment, Resource};

    fn write_sample(path: &Path) {
        let mut a = ArchiveFile::new();
        for id in ["eaid://track/miami/road.mat", "eaid://track/miami/sky.tex"] {
            let frag = Fragment::new("temp", id.as_bytes(), true).unwrap();
            a.add_resource(Resource::new(id, "f", "Material", frag));
        }
        a.update_offsets();
        save(&a, path, &SaveOptions { deterministic: true }).unwrap();
    }

    fn in_place() -> SaveTarget {
        SaveTarget {
            out: None,
            deterministic: true,
        }
    }

    #[test]
    fn transform_rewrites_and_saves() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("track.erp");
        write_sample(&path);
        handle_transform(path.clone(), in_place()).unwrap();
        let a = load(&path).unwrap();
        assert!(a.find("eaid://track/shanghai/road.mat").is_some());
        assert!(a.find("eaid://track/miami/sky.tex").is_none());
    }

    #[test]
    fn out_flag_leaves_input_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("track.erp");
        let out = tmp.path().join("edited.erp");
        write_sample(&path);
        let before = std::fs::read(&path).unwrap();
        let target = SaveTarget {
            out: Some(out.clone()),
            deterministic: true,
        };
        handle_fragment_add(path.clone(), "eaid://track/miami/road.mat".into(), target).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
        let a = load(&out).unwrap();
        assert_eq!(a.find("eaid://track/miami/road.mat").unwrap().fragments().len(), 2);
    }

    #[test]
    fn fragment_add_copies_the_last_fragment() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("track.erp");
        write_sample(&path);
        handle_fragment_add(path.clone(), "eaid://track/miami/road.mat".into(), in_place()).unwrap();
        let a = load(&path).unwrap();
        let frags = a.find("eaid://track/miami/road.mat").unwrap().fragments();
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[1].data_array(true).unwrap(), frags[0].data_array(true).unwrap());
        assert_eq!(&*frags[1].data_array(true).unwrap(), b"eaid://track/miami/road.mat");

        let cli = crate::presentation::cli::Cli::command();
        let add = cli
            .find_subcommand("fragment")
            .and_then(|c| c.find_subcommand("add"))
            .unwrap();
        assert_eq!(
            add.get_about().unwrap().to_string(),
            "Append a copy of the last fragment to a resource"
        );
    }

    #[test]
    fn failed_edit_does_not_save() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("track.erp");
        write_sample(&path);
        let before = std::fs::read(&path).unwrap();
        let err = handle_repath(
            path.clone(),
            "eaid://track/miami/road.mat".into(),
            "eaid://track/miami/sky.tex".into(),
            false,
            in_place(),
        )
        .unwrap_err();
        assert!(matches!(err, ErpError::Validation(_)));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn export_then_import_through_handlers() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("track.erp");
        let dest = tmp.path().join("out");
        write_sample(&path);
        handle_export(path.clone(), dest.clone(), None).unwrap();
        let road = dest.join("track").join("miami").join("road.mat");
        std::fs::write(&road, b"fresh asphalt").unwrap();
        handle_import(path.clone(), dest, None, in_place()).unwrap();
        let a = load(&path).unwrap();
        let data = a.find("eaid://track/miami/road.mat").unwrap().fragments()[0]
            .data_array(true)
            .unwrap()
            .into_owned();
        assert_eq!(data, b"fresh asphalt");
    }
}

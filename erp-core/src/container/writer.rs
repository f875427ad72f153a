use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::info;

use crate::container::manifest::{FragmentEntry, Manifest, Meta, ResourceEntry};
use crate::container::superblock::Superblock;
use crate::container::tail::TailSummary;
use crate::error::{ErpError, Result};
use crate::model::archive::ArchiveFile;

#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    /// When true, zero the manifest timestamp for byte-identical output.
    pub deterministic: bool,
}

/// Encode `archive` as container bytes. Offsets must be current.
pub fn serialize(archive: &ArchiveFile, opts: &SaveOptions) -> Result<Vec<u8>> {
    if archive.offsets_stale() {
        return Err(ErpError::StaleOffsets);
    }

    let created = if opts.deterministic {
        0
    } else {
        OffsetDateTime::now_utc().unix_timestamp()
    };

    let mut data_hash = blake3::Hasher::new();
    let mut total_u = 0u64;
    let mut total_c = 0u64;
    let mut resources = Vec::with_capacity(archive.len());
    for res in archive.resources() {
        let mut fragments = Vec::with_capacity(res.fragments().len());
        for frag in res.fragments() {
            if frag.offset() != total_c {
                return Err(ErpError::StaleOffsets);
            }
            let stored = frag.stored();
            data_hash.update(stored);
            total_u = total_u
                .checked_add(frag.size())
                .ok_or_else(|| ErpError::InvariantViolation("fragment sizes overflow".into()))?;
            total_c += frag.packed_size();
            fragments.push(FragmentEntry {
                name: frag.name().to_string(),
                codec: frag.codec(),
                size: frag.size(),
                packed_size: frag.packed_size(),
                offset: frag.offset(),
                blake3: *blake3::hash(stored).as_bytes(),
            });
        }
        resources.push(ResourceEntry {
            identifier: res.identifier().to_string(),
            file_name: res.file_name().to_string(),
            resource_type: res.resource_type().to_string(),
            fragments,
        });
    }

    let manifest = Manifest {
        resources,
        meta: Meta {
            created,
            tool: format!("erp-core/{}", env!("CARGO_PKG_VERSION")),
            codec_level: archive.codec_options().level,
        },
    };
    let mut manifest_buf = Vec::new();
    ciborium::ser::into_writer(&manifest, &mut manifest_buf)
        .map_err(|e| ErpError::Format(format!("manifest encode: {e}")))?;

    let sb = Superblock::new(manifest_buf.len() as u64);
    let mut out = Vec::with_capacity((sb.data_off + total_c) as usize + 96);
    sb.write_to(&mut out)?;
    out.write_all(&manifest_buf)?;
    for frag in archive.resources().iter().flat_map(|r| r.fragments()) {
        out.write_all(frag.stored())?;
    }
    TailSummary {
        manifest_blake3: *blake3::hash(&manifest_buf).as_bytes(),
        data_blake3: *data_hash.finalize().as_bytes(),
        total_u,
        total_c,
    }
    .write_to(&mut out)?;
    Ok(out)
}

/// Write `archive` to `path`, replacing any existing file only once the new
/// one is fully on disk.
pub fn save(archive: &ArchiveFile, path: &Path, opts: &SaveOptions) -> Result<()> {
    let bytes = serialize(archive, opts)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ErpError::Io(e.error))?;
    info!(
        path = %path.display(),
        resources = archive.len(),
        bytes = bytes.len(),
        "archive saved"
    );
    Ok(())
}

use std::fs;
use std::ops::Range;
use std::path::Path;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

use crate::codec::{CodecId, CodecOptions};
use crate::container::manifest::{MAX_FRAGMENT_SIZE, Manifest, Meta};
use crate::container::superblock::{HEADER_LEN, Superblock, VERSION};
use crate::container::tail::{TAIL_LEN, TailSummary, tail_of};
use crate::error::{ErpError, Result};
use crate::model::archive::ArchiveFile;
use crate::model::fragment::Fragment;
use crate::model::resource::Resource;

/// Container-level facts, as reported by `inspect` and `verify`.
#[derive(Clone, Debug)]
pub struct ContainerInfo {
    pub version: u16,
    pub meta: Meta,
    pub manifest_len: u64,
    pub data_len: u64,
    pub resources: usize,
    pub tail: TailSummary,
}

impl ContainerInfo {
    pub fn manifest_digest_hex(&self) -> String {
        hex::encode(self.tail.manifest_blake3)
    }

    pub fn data_digest_hex(&self) -> String {
        hex::encode(self.tail.data_blake3)
    }

    /// Creation time as RFC 3339, or `None` for deterministic archives.
    pub fn created_rfc3339(&self) -> Option<String> {
        if self.meta.created == 0 {
            return None;
        }
        OffsetDateTime::from_unix_timestamp(self.meta.created)
            .ok()
            .and_then(|t| t.format(&Rfc3339).ok())
    }
}

/// Header, manifest and tail of a container, with the byte ranges they cover.
struct Layout {
    sb: Superblock,
    manifest: Manifest,
    manifest_range: Range<usize>,
    data_range: Range<usize>,
    tail: TailSummary,
}

fn format_err(what: impl std::fmt::Display) -> ErpError {
    ErpError::Format(what.to_string())
}

fn layout(bytes: &[u8]) -> Result<Layout> {
    let len = bytes.len() as u64;
    if len < HEADER_LEN + TAIL_LEN {
        return Err(format_err("file too small for an archive"));
    }
    let sb = Superblock::read_from(bytes).map_err(format_err)?;
    if sb.version != VERSION {
        return Err(format_err(format!("unsupported version {}", sb.version)));
    }
    let data_end = len - TAIL_LEN;
    let manifest_end = HEADER_LEN
        .checked_add(sb.manifest_len)
        .filter(|end| *end == sb.data_off && *end <= data_end)
        .ok_or_else(|| format_err("manifest length does not match header"))?;
    let tail = tail_of(bytes).map_err(format_err)?;

    let manifest_range = HEADER_LEN as usize..manifest_end as usize;
    let data_range = sb.data_off as usize..data_end as usize;
    if (data_range.len() as u64) != tail.total_c {
        return Err(format_err("data region length does not match tail"));
    }
    let manifest_bytes = &bytes[manifest_range.clone()];
    if *blake3::hash(manifest_bytes).as_bytes() != tail.manifest_blake3 {
        return Err(format_err("manifest digest mismatch"));
    }
    let manifest: Manifest =
        ciborium::de::from_reader(manifest_bytes).map_err(|e| format_err(format!("manifest decode: {e}")))?;

    Ok(Layout {
        sb,
        manifest,
        manifest_range,
        data_range,
        tail,
    })
}

/// Decode container bytes into an archive with offsets already current.
pub fn parse(bytes: &[u8]) -> Result<ArchiveFile> {
    let Layout {
        manifest,
        data_range,
        tail,
        ..
    } = layout(bytes)?;
    let data = &bytes[data_range];

    let mut cursor = 0u64;
    let mut total_u = 0u64;
    let mut resources = Vec::with_capacity(manifest.resources.len());
    for entry in manifest.resources {
        let mut fragments = Vec::with_capacity(entry.fragments.len());
        for (i, fe) in entry.fragments.into_iter().enumerate() {
            let at = || format!("fragment {i} of {}", entry.identifier);
            if fe.offset != cursor {
                return Err(format_err(format!("{} is out of order", at())));
            }
            let end = fe
                .offset
                .checked_add(fe.packed_size)
                .filter(|end| *end <= data.len() as u64)
                .ok_or_else(|| format_err(format!("{} is out of bounds", at())))?;
            let stored = &data[fe.offset as usize..end as usize];
            if *blake3::hash(stored).as_bytes() != fe.blake3 {
                return Err(format_err(format!("{} digest mismatch", at())));
            }
            if fe.codec == CodecId::Store && fe.size != fe.packed_size {
                return Err(format_err(format!("{} has inconsistent sizes", at())));
            }
            if fe.size > MAX_FRAGMENT_SIZE {
                return Err(format_err(format!("{} declares {} bytes", at(), fe.size)));
            }
            let mut frag = Fragment::from_stored(fe.name, fe.codec, fe.size, stored.to_vec());
            frag.set_offset(fe.offset);
            fragments.push(frag);
            cursor = end;
            total_u = total_u
                .checked_add(fe.size)
                .ok_or_else(|| format_err("fragment sizes overflow"))?;
        }
        let res = Resource::with_fragments(
            entry.identifier,
            entry.file_name,
            entry.resource_type,
            fragments,
        )
        .map_err(|e| format_err(e.to_string()))?;
        resources.push(res);
    }
    if cursor != data.len() as u64 || total_u != tail.total_u {
        return Err(format_err("fragment totals do not match tail"));
    }

    debug!(resources = resources.len(), data_len = cursor, "archive parsed");
    Ok(ArchiveFile::from_loaded(
        resources,
        CodecOptions {
            level: manifest.meta.codec_level,
        },
    ))
}

pub fn load(path: &Path) -> Result<ArchiveFile> {
    let bytes = fs::read(path)?;
    let archive = parse(&bytes)?;
    info!(path = %path.display(), resources = archive.len(), "archive loaded");
    Ok(archive)
}

fn info_from(layout: Layout) -> ContainerInfo {
    ContainerInfo {
        version: layout.sb.version,
        manifest_len: layout.manifest_range.len() as u64,
        data_len: layout.data_range.len() as u64,
        resources: layout.manifest.resources.len(),
        meta: layout.manifest.meta,
        tail: layout.tail,
    }
}

/// Read container facts without decoding fragments.
pub fn inspect(path: &Path) -> Result<ContainerInfo> {
    let bytes = fs::read(path)?;
    Ok(info_from(layout(&bytes)?))
}

/// Check the manifest and data region against the digests in the tail.
pub fn verify_bytes(bytes: &[u8]) -> Result<ContainerInfo> {
    let layout = layout(bytes)?;
    let data = &bytes[layout.data_range.clone()];
    if *blake3::hash(data).as_bytes() != layout.tail.data_blake3 {
        return Err(format_err("data digest mismatch"));
    }
    Ok(info_from(layout))
}

pub fn verify(path: &Path) -> Result<ContainerInfo> {
    let bytes = fs::read(path)?;
    let info = verify_bytes(&bytes)?;
    info!(path = %path.display(), data = %info.data_digest_hex(), "archive verified");
    Ok(info)
}

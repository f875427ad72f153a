use tracing::debug;

use super::fragment::Fragment;
use super::resource::{Resource, ResourceId};
use crate::codec::CodecOptions;
use crate::domain::{FragmentRow, ResourceRow};
use crate::error::{ErpError, Result};
use crate::stats::Stats;

/// In-memory ERP archive: resources in on-disk order.
///
/// Structural edits mark the offset table stale; callers batch their edits
/// and run [`ArchiveFile::update_offsets`] once at the end.
#[derive(Clone, Debug, Default)]
pub struct ArchiveFile {
    resources: Vec<Resource>,
    next_id: u64,
    offsets_stale: bool,
    offset_generation: u64,
    codec: CodecOptions,
}

impl ArchiveFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec(codec: CodecOptions) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    pub fn codec_options(&self) -> &CodecOptions {
        &self.codec
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        self.resources.iter().map(Resource::id).collect()
    }

    pub fn position(&self, id: ResourceId) -> Option<usize> {
        self.resources.iter().position(|r| r.id == id)
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.id == id)
    }

    fn require_mut(&mut self, id: ResourceId) -> Result<&mut Resource> {
        self.get_mut(id)
            .ok_or_else(|| ErpError::NotFound(format!("resource {id}")))
    }

    /// First resource in archive order carrying exactly `identifier`.
    pub fn find(&self, identifier: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.identifier() == identifier)
    }

    pub fn find_mut(&mut self, identifier: &str) -> Option<&mut Resource> {
        self.resources
            .iter_mut()
            .find(|r| r.identifier() == identifier)
    }

    pub fn find_id(&self, identifier: &str) -> Option<ResourceId> {
        self.find(identifier).map(Resource::id)
    }

    pub fn add_resource(&mut self, mut resource: Resource) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        resource.id = id;
        self.resources.push(resource);
        self.offsets_stale = true;
        id
    }

    /// Remove exactly the resource behind `id`, whatever its identifier.
    pub fn remove_resource(&mut self, id: ResourceId) -> Result<Resource> {
        let pos = self
            .position(id)
            .ok_or_else(|| ErpError::NotFound(format!("resource {id}")))?;
        self.offsets_stale = true;
        Ok(self.resources.remove(pos))
    }

    /// Append a copy of `source` whose fragments were re-encoded compressed.
    /// The copy keeps the identifier; repath it before relying on lookups.
    pub fn duplicate_resource(&mut self, source: ResourceId) -> Result<ResourceId> {
        let src = self
            .get(source)
            .ok_or_else(|| ErpError::NotFound(format!("resource {source}")))?;
        let fragments = src
            .fragments()
            .iter()
            .map(|f| f.recompressed(&self.codec))
            .collect::<Result<Vec<_>>>()?;
        let copy = Resource::with_fragments(
            src.identifier(),
            src.file_name(),
            src.resource_type(),
            fragments,
        )?;
        let id = self.add_resource(copy);
        debug!(%source, copy = %id, "duplicated resource");
        Ok(id)
    }

    /// Append a copy of the resource's last fragment.
    pub fn add_fragment(&mut self, id: ResourceId) -> Result<usize> {
        let res = self.require_mut(id)?;
        let frags = res.fragments_mut();
        let last = frags
            .last()
            .cloned()
            .ok_or_else(|| ErpError::InvariantViolation(format!("resource {id} has no fragments")))?;
        frags.push(last);
        let count = frags.len();
        self.offsets_stale = true;
        Ok(count)
    }

    /// Drop the last fragment. A resource never goes below one fragment.
    pub fn remove_fragment(&mut self, id: ResourceId) -> Result<Fragment> {
        let res = self.require_mut(id)?;
        if res.fragments().len() <= 1 {
            return Err(ErpError::InvariantViolation(format!(
                "cannot remove the only fragment of {}",
                res.identifier()
            )));
        }
        let removed = res
            .fragments_mut()
            .pop()
            .ok_or_else(|| ErpError::Consistency(format!("resource {id} lost its fragments")))?;
        self.offsets_stale = true;
        Ok(removed)
    }

    /// Replace one fragment's payload.
    pub fn set_fragment_data(
        &mut self,
        id: ResourceId,
        index: usize,
        bytes: &[u8],
        compress: bool,
    ) -> Result<()> {
        let codec = self.codec;
        let res = self.require_mut(id)?;
        let count = res.fragments().len();
        let frag = res.fragments_mut().get_mut(index).ok_or_else(|| {
            ErpError::NotFound(format!("fragment {index} of {id} (has {count})"))
        })?;
        frag.set_data_with(bytes, compress, &codec)?;
        self.offsets_stale = true;
        Ok(())
    }

    /// Swap in an already encoded fragment at `index`.
    pub(crate) fn replace_fragment(
        &mut self,
        id: ResourceId,
        index: usize,
        fragment: Fragment,
    ) -> Result<()> {
        let res = self.require_mut(id)?;
        let slot = res
            .fragments_mut()
            .get_mut(index)
            .ok_or_else(|| ErpError::NotFound(format!("fragment {index} of {id}")))?;
        *slot = fragment;
        self.offsets_stale = true;
        Ok(())
    }

    pub fn set_resource_type(&mut self, id: ResourceId, new_type: &str) -> Result<()> {
        let value = non_empty("resource type", new_type)?;
        self.require_mut(id)?.set_resource_type(value);
        Ok(())
    }

    pub fn rename_resource(&mut self, id: ResourceId, new_file_name: &str) -> Result<()> {
        let value = non_empty("file name", new_file_name)?;
        self.require_mut(id)?.set_file_name(value);
        Ok(())
    }

    pub fn repath_resource(&mut self, id: ResourceId, new_identifier: &str) -> Result<()> {
        let value = non_empty("identifier", new_identifier)?;
        self.require_mut(id)?.set_identifier(value);
        Ok(())
    }

    /// Lay fragments out back to back in archive order and return the total
    /// length of the data region.
    pub fn update_offsets(&mut self) -> u64 {
        let mut cursor = 0u64;
        for res in &mut self.resources {
            for frag in res.fragments_mut() {
                frag.set_offset(cursor);
                cursor += frag.packed_size();
            }
        }
        self.offsets_stale = false;
        self.offset_generation += 1;
        debug!(
            generation = self.offset_generation,
            data_len = cursor,
            "offsets updated"
        );
        cursor
    }

    pub fn offsets_stale(&self) -> bool {
        self.offsets_stale
    }

    /// Number of times `update_offsets` has run on this archive.
    pub fn offset_generation(&self) -> u64 {
        self.offset_generation
    }

    pub fn rows(&self) -> Vec<ResourceRow> {
        self.resources
            .iter()
            .map(|r| ResourceRow {
                id: r.id(),
                identifier: r.identifier().to_string(),
                file_name: r.file_name().to_string(),
                resource_type: r.resource_type().to_string(),
                fragments: r.fragments().len(),
                size: r.size(),
                packed_size: r.packed_size(),
            })
            .collect()
    }

    pub fn fragment_rows(&self, id: ResourceId) -> Result<Vec<FragmentRow>> {
        let res = self
            .get(id)
            .ok_or_else(|| ErpError::NotFound(format!("resource {id}")))?;
        Ok(res
            .fragments()
            .iter()
            .enumerate()
            .map(|(ordinal, f)| FragmentRow {
                ordinal,
                name: f.name().to_string(),
                codec: f.codec(),
                size: f.size(),
                packed_size: f.packed_size(),
                offset: f.offset(),
            })
            .collect())
    }

    pub fn stats(&self) -> Stats {
        let mut s = Stats {
            resources: self.resources.len() as u64,
            ..Stats::default()
        };
        for frag in self.resources.iter().flat_map(|r| r.fragments()) {
            s.fragments += 1;
            if frag.is_compressed() {
                s.compressed_fragments += 1;
            }
            s.logical_bytes += frag.size();
            s.packed_bytes += frag.packed_size();
        }
        s.compression_ratio = if s.logical_bytes == 0 {
            1.0
        } else {
            (s.packed_bytes as f64 / s.logical_bytes as f64) as f32
        };
        s
    }

    /// Adopt a fully laid out resource list, e.g. one decoded from a container.
    pub(crate) fn from_loaded(resources: Vec<Resource>, codec: CodecOptions) -> Self {
        let mut archive = Self::with_codec(codec);
        for res in resources {
            archive.add_resource(res);
        }
        archive.offsets_stale = false;
        archive
    }
}

fn non_empty(what: &str, value: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(ErpError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn res(identifier: &str, payload: &[u8]) -> Resource {
        Resource::new(
            identifier,
            identifier.rsplit('/').next().unwrap_or(identifier),
            "Material",
            Fragment::new("temp", payload, false).unwrap(),
        )
    }

    fn assert_contiguous(archive: &ArchiveFile) {
        let mut expected = 0u64;
        for frag in archive.resources().iter().flat_map(|r| r.fragments()) {
            assert_eq!(frag.offset(), expected);
            expected += frag.packed_size();
        }
    }

    #[test]
    fn offsets_are_running_totals() {
        let mut a = ArchiveFile::new();
        let first = a.add_resource(res("eaid://x/a.mat", b"aaaa"));
        a.add_resource(res("eaid://x/b.mat", b"bb"));
        a.add_fragment(first).unwrap();
        assert!(a.offsets_stale());
        let total = a.update_offsets();
        assert_eq!(total, 10);
        assert!(!a.offsets_stale());
        let offs: Vec<u64> = a
            .resources()
            .iter()
            .flat_map(|r| r.fragments().iter().map(Fragment::offset))
            .collect();
        assert_eq!(offs, vec![0, 4, 8]);
    }

    #[test]
    fn remove_last_fragment_is_refused() {
        let mut a = ArchiveFile::new();
        let id = a.add_resource(res("eaid://x/a.mat", b"aaaa"));
        a.update_offsets();
        let err = a.remove_fragment(id).unwrap_err();
        assert!(matches!(err, ErpError::InvariantViolation(_)));
        assert_eq!(a.get(id).unwrap().fragments().len(), 1);
        assert!(!a.offsets_stale());
    }

    #[test]
    fn add_then_remove_fragment() {
        let mut a = ArchiveFile::new();
        let id = a.add_resource(res("eaid://x/a.mat", b"aaaa"));
        assert_eq!(a.add_fragment(id).unwrap(), 2);
        a.set_fragment_data(id, 1, b"zz", false).unwrap();
        assert_eq!(&*a.get(id).unwrap().fragments()[0].data_array(true).unwrap(), b"aaaa");
        let removed = a.remove_fragment(id).unwrap();
        assert_eq!(removed.stored(), b"zz");
    }

    #[test]
    fn remove_resource_by_handle_among_duplicates() {
        let mut a = ArchiveFile::new();
        let first = a.add_resource(res("eaid://x/a.mat", b"1"));
        let second = a.add_resource(res("eaid://x/a.mat", b"2"));
        let removed = a.remove_resource(second).unwrap();
        assert_eq!(removed.fragments()[0].stored(), b"2");
        assert_eq!(a.len(), 1);
        assert_eq!(a.find_id("eaid://x/a.mat"), Some(first));
        assert!(matches!(a.remove_resource(second), Err(ErpError::NotFound(_))));
    }

    #[test]
    fn find_returns_first_match() {
        let mut a = ArchiveFile::new();
        let first = a.add_resource(res("eaid://x/a.mat", b"1"));
        a.add_resource(res("eaid://x/a.mat", b"2"));
        assert_eq!(a.find_id("eaid://x/a.mat"), Some(first));
        assert!(a.find("eaid://x/A.mat").is_none());
        assert_eq!(a.find_mut("eaid://x/a.mat").map(|r| r.id()), Some(first));
    }

    #[test]
    fn duplicate_is_independent() {
        let mut a = ArchiveFile::new();
        let orig = a.add_resource(res("eaid://x/a.mat", b"original"));
        let dup = a.duplicate_resource(orig).unwrap();
        let copy = a.get(dup).unwrap();
        assert_eq!(copy.identifier(), "eaid://x/a.mat");
        assert_eq!(copy.file_name(), "a.mat");
        assert_eq!(copy.resource_type(), "Material");
        assert!(copy.fragments()[0].is_compressed());

        a.set_fragment_data(orig, 0, b"mutated", false).unwrap();
        let copy = a.get(dup).unwrap();
        assert_eq!(&*copy.fragments()[0].data_array(true).unwrap(), b"original");
    }

    #[test]
    fn field_edits_reject_blank_input() {
        let mut a = ArchiveFile::new();
        let id = a.add_resource(res("eaid://x/a.mat", b"1"));
        assert!(matches!(a.rename_resource(id, "  "), Err(ErpError::InvalidInput(_))));
        assert!(matches!(a.repath_resource(id, ""), Err(ErpError::InvalidInput(_))));
        assert!(matches!(a.set_resource_type(id, ""), Err(ErpError::InvalidInput(_))));
        a.rename_resource(id, "b.mat").unwrap();
        a.repath_resource(id, "eaid://y/b.mat").unwrap();
        a.set_resource_type(id, "Texture").unwrap();
        let r = a.get(id).unwrap();
        assert_eq!(
            (r.file_name(), r.identifier(), r.resource_type()),
            ("b.mat", "eaid://y/b.mat", "Texture")
        );
    }

    #[test]
    fn stats_sum_fragments() {
        let mut a = ArchiveFile::new();
        let id = a.add_resource(res("eaid://x/a.mat", b"1234"));
        a.add_fragment(id).unwrap();
        let s = a.stats();
        assert_eq!((s.resources, s.fragments, s.logical_bytes), (1, 2, 8));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(Vec<u8>),
        Remove(usize),
        Dup(usize),
        AddFrag(usize),
        RemoveFrag(usize),
        SetData(usize, Vec<u8>, bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        let bytes = proptest::collection::vec(any::<u8>(), 0..64);
        prop_oneof![
            bytes.clone().prop_map(Op::Add),
            any::<usize>().prop_map(Op::Remove),
            any::<usize>().prop_map(Op::Dup),
            any::<usize>().prop_map(Op::AddFrag),
            any::<usize>().prop_map(Op::RemoveFrag),
            (any::<usize>(), bytes, any::<bool>()).prop_map(|(i, b, c)| Op::SetData(i, b, c)),
        ]
    }

    proptest! {
        #[test]
        fn offsets_stay_contiguous(ops in proptest::collection::vec(op(), 1..40)) {
            let mut a = ArchiveFile::new();
            a.add_resource(res("eaid://seed/r.bin", b"seed"));
            for op in ops {
                let ids = a.ids();
                let pick = |i: usize| (!ids.is_empty()).then(|| ids[i % ids.len()]);
                match op {
                    Op::Add(b) => { a.add_resource(res("eaid://p/r.bin", &b)); }
                    Op::Remove(i) => { if let Some(id) = pick(i) { a.remove_resource(id).unwrap(); } }
                    Op::Dup(i) => { if let Some(id) = pick(i) { a.duplicate_resource(id).unwrap(); } }
                    Op::AddFrag(i) => { if let Some(id) = pick(i) { a.add_fragment(id).unwrap(); } }
                    Op::RemoveFrag(i) => { if let Some(id) = pick(i) { let _ = a.remove_fragment(id); } }
                    Op::SetData(i, b, c) => { if let Some(id) = pick(i) { a.set_fragment_data(id, 0, &b, c).unwrap(); } }
                }
            }
            let total = a.update_offsets();
            assert_contiguous(&a);
            prop_assert_eq!(total, a.stats().packed_bytes);
        }
    }
}

use std::collections::HashMap;

use crate::model::archive::ArchiveFile;
use crate::model::resource::ResourceId;

/// Identifier lookup table built from an archive snapshot.
///
/// Every identifier keeps the handles of all resources carrying it in
/// archive order, so `first` agrees with `ArchiveFile::find` even when
/// identifiers repeat.
#[derive(Clone, Debug, Default)]
pub struct IdentifierIndex {
    by_identifier: HashMap<String, Vec<ResourceId>>,
}

impl IdentifierIndex {
    pub fn build(archive: &ArchiveFile) -> Self {
        let mut index = Self::default();
        for res in archive.resources() {
            index.insert(res.identifier(), res.id());
        }
        index
    }

    /// Register `id` under `identifier` behind any earlier holders.
    pub fn insert(&mut self, identifier: &str, id: ResourceId) {
        self.by_identifier
            .entry(identifier.to_string())
            .or_default()
            .push(id);
    }

    pub fn remove(&mut self, identifier: &str, id: ResourceId) {
        if let Some(ids) = self.by_identifier.get_mut(identifier) {
            ids.retain(|x| *x != id);
            if ids.is_empty() {
                self.by_identifier.remove(identifier);
            }
        }
    }

    pub fn first(&self, identifier: &str) -> Option<ResourceId> {
        self.by_identifier
            .get(identifier)
            .and_then(|ids| ids.first().copied())
    }

    pub fn all(&self, identifier: &str) -> &[ResourceId] {
        self.by_identifier
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.by_identifier.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.by_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identifier.is_empty()
    }

    /// Identifiers held by more than one resource, sorted.
    pub fn duplicates(&self) -> Vec<(&str, usize)> {
        let mut out: Vec<(&str, usize)> = self
            .by_identifier
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(k, ids)| (k.as_str(), ids.len()))
            .collect();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fragment::Fragment;
    use crate::model::resource::Resource;

    fn archive(ids: &[&str]) -> (ArchiveFile, Vec<ResourceId>) {
        let mut a = ArchiveFile::new();
        let handles = ids
            .iter()
            .map(|id| {
                let frag = Fragment::new("temp", id.as_bytes(), false).unwrap();
                a.add_resource(Resource::new(*id, "f", "Material", frag))
            })
            .collect();
        (a, handles)
    }

    #[test]
    fn first_match_wins() {
        let (a, h) = archive(&["eaid://a", "eaid://b", "eaid://a"]);
        let idx = IdentifierIndex::build(&a);
        assert_eq!(idx.first("eaid://a"), Some(h[0]));
        assert_eq!(idx.first("eaid://a"), a.find_id("eaid://a"));
        assert_eq!(idx.all("eaid://a"), &[h[0], h[2]]);
        assert_eq!(idx.first("eaid://c"), None);
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let (a, _) = archive(&["eaid://Tex/A.tga"]);
        let idx = IdentifierIndex::build(&a);
        assert!(idx.contains("eaid://Tex/A.tga"));
        assert!(!idx.contains("eaid://tex/a.tga"));
    }

    #[test]
    fn duplicates_are_reported() {
        let (a, h) = archive(&["eaid://a", "eaid://b", "eaid://a", "eaid://b", "eaid://c"]);
        let mut idx = IdentifierIndex::build(&a);
        assert_eq!(idx.duplicates(), vec![("eaid://a", 2), ("eaid://b", 2)]);
        idx.remove("eaid://a", h[0]);
        assert_eq!(idx.first("eaid://a"), Some(h[2]));
        assert_eq!(idx.duplicates(), vec![("eaid://b", 2)]);
    }
}

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::{ErpError, Result, ValidationError};
use crate::index::inmem::IdentifierIndex;
use crate::model::archive::ArchiveFile;
use crate::model::resource::ResourceId;

/// One identifier rewrite inside a [`BatchRename`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenamePair {
    pub source: String,
    pub dest: String,
    /// When set, the pair targets this exact resource instead of the first
    /// resource carrying `source`.
    pub pinned: Option<ResourceId>,
}

impl RenamePair {
    pub fn new(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            pinned: None,
        }
    }

    pub fn pinned(id: ResourceId, source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            pinned: Some(id),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub renamed: usize,
    pub offset_generation: u64,
}

/// Validate-then-apply identifier rewrite. Either every pair lands or the
/// archive is left untouched.
#[derive(Clone, Debug, Default)]
pub struct BatchRename {
    pairs: Vec<RenamePair>,
    allow_overwrite: bool,
}

impl BatchRename {
    pub fn new(allow_overwrite: bool) -> Self {
        Self {
            pairs: Vec::new(),
            allow_overwrite,
        }
    }

    pub fn from_pairs(pairs: Vec<RenamePair>, allow_overwrite: bool) -> Self {
        Self {
            pairs,
            allow_overwrite,
        }
    }

    pub fn rename(mut self, source: impl Into<String>, dest: impl Into<String>) -> Self {
        self.pairs.push(RenamePair::new(source, dest));
        self
    }

    pub fn push(&mut self, pair: RenamePair) {
        self.pairs.push(pair);
    }

    pub fn pairs(&self) -> &[RenamePair] {
        &self.pairs
    }

    pub fn allow_overwrite(&self) -> bool {
        self.allow_overwrite
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Resolve every pair against the archive without touching it.
    pub fn validate(&self, archive: &ArchiveFile) -> std::result::Result<Vec<ResourceId>, ValidationError> {
        let index = IdentifierIndex::build(archive);
        let mut seen = HashSet::with_capacity(self.pairs.len());
        let mut claimed = HashSet::with_capacity(self.pairs.len());
        let mut targets = Vec::with_capacity(self.pairs.len());

        for pair in &self.pairs {
            let resolved = match pair.pinned {
                Some(id) => archive
                    .get(id)
                    .filter(|r| r.identifier() == pair.source)
                    .map(|r| r.id()),
                None => index.first(&pair.source),
            };
            let id = resolved.ok_or_else(|| ValidationError::Missing {
                identifier: pair.source.clone(),
            })?;

            if !self.allow_overwrite {
                let taken = pair.dest != pair.source && index.contains(&pair.dest);
                if taken || !claimed.insert(pair.dest.as_str()) {
                    return Err(ValidationError::Collision {
                        identifier: pair.dest.clone(),
                    });
                }
            }
            if !seen.insert(id) {
                return Err(ValidationError::DuplicateSource {
                    identifier: pair.source.clone(),
                });
            }
            targets.push(id);
        }
        Ok(targets)
    }

    /// Validate, commit, and recompute offsets once.
    pub fn apply(&self, archive: &mut ArchiveFile) -> Result<BatchSummary> {
        let targets = self.validate(archive)?;
        self.commit(archive, &targets)
    }

    /// Write the pairs onto the resources `validate` resolved them to.
    fn commit(&self, archive: &mut ArchiveFile, targets: &[ResourceId]) -> Result<BatchSummary> {
        // Nothing may have moved since validation; check all before writing any.
        for (pair, id) in self.pairs.iter().zip(targets) {
            match archive.get(*id) {
                Some(res) if res.identifier() == pair.source => {}
                Some(res) => {
                    return Err(ErpError::Consistency(format!(
                        "resource {id} changed from {} to {} during commit",
                        pair.source,
                        res.identifier()
                    )));
                }
                None => {
                    return Err(ErpError::Consistency(format!(
                        "resource {id} ({}) vanished during commit",
                        pair.source
                    )));
                }
            }
        }

        for (pair, id) in self.pairs.iter().zip(targets) {
            let res = archive.get_mut(*id).ok_or_else(|| {
                ErpError::Consistency(format!("resource {id} vanished during commit"))
            })?;
            res.set_identifier(pair.dest.clone());
            debug!(from = %pair.source, to = %pair.dest, "identifier rewritten");
        }

        archive.update_offsets();
        info!(renamed = targets.len(), "batch rename committed");
        Ok(BatchSummary {
            renamed: targets.len(),
            offset_generation: archive.offset_generation(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fragment::Fragment;
    use crate::model::resource::Resource;

    fn archive(ids: &[&str]) -> ArchiveFile {
        let mut a = ArchiveFile::new();
        for id in ids {
            let frag = Fragment::new("temp", b"payload", false).unwrap();
            a.add_resource(Resource::new(*id, "f", "Material", frag));
        }
        a.update_offsets();
        a
    }

    fn identifiers(a: &ArchiveFile) -> Vec<String> {
        a.resources().iter().map(|r| r.identifier().to_string()).collect()
    }

    #[test]
    fn applies_every_pair_and_updates_offsets_once() {
        let mut a = archive(&["eaid://x/a.mat", "eaid://x/b.mat"]);
        let before = a.offset_generation();
        let summary = BatchRename::new(false)
            .rename("eaid://x/a.mat", "eaid://y/a.mat")
            .rename("eaid://x/b.mat", "eaid://y/b.mat")
            .apply(&mut a)
            .unwrap();
        assert_eq!(summary.renamed, 2);
        assert_eq!(a.offset_generation(), before + 1);
        assert_eq!(identifiers(&a), vec!["eaid://y/a.mat", "eaid://y/b.mat"]);
    }

    #[test]
    fn missing_source_aborts_without_changes() {
        let mut a = archive(&["eaid://x/a.mat", "eaid://x/b.mat"]);
        let before = identifiers(&a);
        let generation = a.offset_generation();
        let err = BatchRename::new(true)
            .rename("eaid://x/a.mat", "eaid://y/a.mat")
            .rename("eaid://x/missing.mat", "eaid://y/missing.mat")
            .apply(&mut a)
            .unwrap_err();
        match err {
            ErpError::Validation(ValidationError::Missing { identifier }) => {
                assert_eq!(identifier, "eaid://x/missing.mat")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(identifiers(&a), before);
        assert_eq!(a.offset_generation(), generation);
    }

    #[test]
    fn collision_rejected_unless_overwrite_allowed() {
        let mut a = archive(&["eaid://x/a.mat", "eaid://x/b.mat"]);
        let batch = BatchRename::new(false).rename("eaid://x/a.mat", "eaid://x/b.mat");
        let err = batch.apply(&mut a).unwrap_err();
        assert!(matches!(
            err,
            ErpError::Validation(ValidationError::Collision { ref identifier }) if identifier == "eaid://x/b.mat"
        ));
        assert_eq!(identifiers(&a), vec!["eaid://x/a.mat", "eaid://x/b.mat"]);

        let batch = BatchRename::new(true).rename("eaid://x/a.mat", "eaid://x/b.mat");
        batch.apply(&mut a).unwrap();
        assert_eq!(identifiers(&a), vec!["eaid://x/b.mat", "eaid://x/b.mat"]);
    }

    #[test]
    fn two_pairs_onto_one_new_destination_collide() {
        let mut a = archive(&["eaid://x/a.mat", "eaid://x/b.mat"]);
        let generation = a.offset_generation();
        let err = BatchRename::new(false)
            .rename("eaid://x/a.mat", "eaid://y/c.mat")
            .rename("eaid://x/b.mat", "eaid://y/c.mat")
            .apply(&mut a)
            .unwrap_err();
        assert!(matches!(
            err,
            ErpError::Validation(ValidationError::Collision { ref identifier }) if identifier == "eaid://y/c.mat"
        ));
        assert_eq!(identifiers(&a), vec!["eaid://x/a.mat", "eaid://x/b.mat"]);
        assert_eq!(a.offset_generation(), generation);
    }

    #[test]
    fn shared_destination_is_fine_with_overwrite() {
        let mut a = archive(&["eaid://x/a.mat", "eaid://x/b.mat"]);
        BatchRename::new(true)
            .rename("eaid://x/a.mat", "eaid://y/c.mat")
            .rename("eaid://x/b.mat", "eaid://y/c.mat")
            .apply(&mut a)
            .unwrap();
        assert_eq!(identifiers(&a), vec!["eaid://y/c.mat", "eaid://y/c.mat"]);
    }

    #[test]
    fn change_after_validation_blocks_every_write() {
        let mut a = archive(&["eaid://x/a.mat", "eaid://x/b.mat"]);
        let batch = BatchRename::new(false)
            .rename("eaid://x/a.mat", "eaid://y/a.mat")
            .rename("eaid://x/b.mat", "eaid://y/b.mat");
        let targets = batch.validate(&a).unwrap();

        a.repath_resource(targets[1], "eaid://z/other.mat").unwrap();
        a.update_offsets();
        let generation = a.offset_generation();

        let err = batch.commit(&mut a, &targets).unwrap_err();
        assert!(matches!(err, ErpError::Consistency(_)));
        assert_eq!(identifiers(&a), vec!["eaid://x/a.mat", "eaid://z/other.mat"]);
        assert_eq!(a.offset_generation(), generation);
    }

    #[test]
    fn removal_after_validation_is_a_consistency_error() {
        let mut a = archive(&["eaid://x/a.mat", "eaid://x/b.mat"]);
        let batch = BatchRename::new(true).rename("eaid://x/b.mat", "eaid://y/b.mat");
        let targets = batch.validate(&a).unwrap();
        a.remove_resource(targets[0]).unwrap();
        assert!(matches!(
            batch.commit(&mut a, &targets),
            Err(ErpError::Consistency(_))
        ));
        assert_eq!(identifiers(&a), vec!["eaid://x/a.mat"]);
    }

    #[test]
    fn same_resource_twice_is_rejected() {
        let mut a = archive(&["eaid://x/a.mat"]);
        let err = BatchRename::new(true)
            .rename("eaid://x/a.mat", "eaid://y/a.mat")
            .rename("eaid://x/a.mat", "eaid://z/a.mat")
            .apply(&mut a)
            .unwrap_err();
        assert!(matches!(
            err,
            ErpError::Validation(ValidationError::DuplicateSource { .. })
        ));
        assert_eq!(identifiers(&a), vec!["eaid://x/a.mat"]);
    }

    #[test]
    fn pinned_pairs_reach_later_duplicates() {
        let mut a = archive(&["eaid://x/a.mat", "eaid://x/a.mat"]);
        let ids = a.ids();
        BatchRename::from_pairs(
            vec![
                RenamePair::pinned(ids[0], "eaid://x/a.mat", "eaid://y/a.mat"),
                RenamePair::pinned(ids[1], "eaid://x/a.mat", "eaid://z/a.mat"),
            ],
            true,
        )
        .apply(&mut a)
        .unwrap();
        assert_eq!(identifiers(&a), vec!["eaid://y/a.mat", "eaid://z/a.mat"]);
    }

    #[test]
    fn stale_pin_is_missing() {
        let mut a = archive(&["eaid://x/a.mat"]);
        let id = a.ids()[0];
        let batch = BatchRename::from_pairs(
            vec![RenamePair::pinned(id, "eaid://x/other.mat", "eaid://y/a.mat")],
            true,
        );
        assert!(matches!(
            batch.validate(&a),
            Err(ValidationError::Missing { .. })
        ));
    }

    #[test]
    fn empty_batch_still_recomputes_once() {
        let mut a = archive(&["eaid://x/a.mat"]);
        let generation = a.offset_generation();
        let summary = BatchRename::new(false).apply(&mut a).unwrap();
        assert_eq!(summary.renamed, 0);
        assert_eq!(a.offset_generation(), generation + 1);
    }
}

//! Ready-made identifier rewrites built on [`BatchRename`].

use super::batch::{BatchRename, RenamePair};
use crate::error::{ErpError, Result};
use crate::model::archive::ArchiveFile;

/// Source side of the fixed identifier transform.
pub const TRANSFORM_SRC: &str = "miami";
/// Destination side of the fixed identifier transform.
pub const TRANSFORM_DEST: &str = "shanghai";

/// Substring substitution across every identifier in the archive.
///
/// Pairs are pinned to resource handles, so repeated identifiers are all
/// rewritten. Resources whose identifier does not contain `find` are left out.
pub fn replace_all(archive: &ArchiveFile, find: &str, replace: &str) -> Result<BatchRename> {
    if find.trim().is_empty() {
        return Err(ErpError::InvalidInput("search string must not be empty".into()));
    }
    if replace.trim().is_empty() {
        return Err(ErpError::InvalidInput("replacement must not be empty".into()));
    }
    let pairs = archive
        .resources()
        .iter()
        .filter(|r| r.identifier().contains(find))
        .map(|r| {
            RenamePair::pinned(
                r.id(),
                r.identifier(),
                r.identifier().replace(find, replace),
            )
        })
        .collect();
    Ok(BatchRename::from_pairs(pairs, true))
}

/// The fixed `miami` to `shanghai` identifier transform.
pub fn track_transform(archive: &ArchiveFile) -> Result<BatchRename> {
    replace_all(archive, TRANSFORM_SRC, TRANSFORM_DEST)
}

/// Puts one driver's suit and glove resources in place of another's.
///
/// The eight body/glove resources of `dest_*` are renamed so they answer to
/// the identifiers of `src_*`.
#[derive(Clone, Debug)]
pub struct DriverClothesSwap {
    /// Driver being replaced, e.g. `carlos_sainz-jr`.
    pub src_driver: String,
    /// Year-team of the driver being replaced, e.g. `2021-haas`.
    pub src_team: String,
    /// New driver, e.g. `carlos_sainz-jr`.
    pub dest_driver: String,
    /// Year-team of the new driver, e.g. `2020-haas`.
    pub dest_team: String,
}

impl DriverClothesSwap {
    fn check(&self) -> Result<()> {
        for (what, v) in [
            ("source driver", &self.src_driver),
            ("source team", &self.src_team),
            ("destination driver", &self.dest_driver),
            ("destination team", &self.dest_team),
        ] {
            if v.trim().is_empty() {
                return Err(ErpError::InvalidInput(format!("{what} must not be empty")));
            }
        }
        Ok(())
    }

    fn src_full(&self) -> String {
        format!("{}_{}", self.src_team, self.src_driver)
    }

    fn dest_full(&self) -> String {
        format!("{}_{}", self.dest_team, self.dest_driver)
    }

    /// Identifiers that must exist before the swap can run.
    pub fn resource_ids(&self) -> Vec<String> {
        let full = self.dest_full();
        let driver = &self.dest_driver;
        let logos = format!("eaid://character_package/drivers/male/{full}/idf/{driver}");
        vec![
            format!("eaid://character_package/condition_scene/idf/driver_body_v2_male.emb?context={full}"),
            format!("eaid://character_package/condition_scene/idf/driver_gloves.emb?context={full}"),
            format!("{logos}_body_logos.emb?context=default"),
            format!("{logos}_body_logos.idf?model"),
            format!("{logos}_body_logos.idf?render"),
            format!("{logos}_glove_logos.emb?context=default"),
            format!("{logos}_glove_logos.idf?model"),
            format!("{logos}_glove_logos.idf?render"),
        ]
    }

    pub fn rewrite(&self, identifier: &str) -> String {
        identifier
            .replace(&self.dest_full(), &self.src_full())
            .replace(&self.dest_driver, &self.src_driver)
    }

    /// Renames must not land on identifiers already in the archive.
    pub fn batch(&self) -> Result<BatchRename> {
        self.check()?;
        let pairs = self
            .resource_ids()
            .into_iter()
            .map(|id| {
                let dest = self.rewrite(&id);
                RenamePair::new(id, dest)
            })
            .collect();
        Ok(BatchRename::from_pairs(pairs, false))
    }
}

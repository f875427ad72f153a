use std::fmt;

use super::fragment::Fragment;
use crate::error::{ErpError, Result};

/// Stable handle for a resource inside one `ArchiveFile`.
///
/// Handles are never reused, so two resources that share an identifier can
/// still be told apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Resource {
    pub(crate) id: ResourceId,
    identifier: String,
    file_name: String,
    resource_type: String,
    fragments: Vec<Fragment>,
}

impl Resource {
    pub fn new(
        identifier: impl Into<String>,
        file_name: impl Into<String>,
        resource_type: impl Into<String>,
        first: Fragment,
    ) -> Self {
        Self {
            id: ResourceId(0),
            identifier: identifier.into(),
            file_name: file_name.into(),
            resource_type: resource_type.into(),
            fragments: vec![first],
        }
    }

    /// Build a resource from an ordered fragment list; an empty list is refused.
    pub fn with_fragments(
        identifier: impl Into<String>,
        file_name: impl Into<String>,
        resource_type: impl Into<String>,
        fragments: Vec<Fragment>,
    ) -> Result<Self> {
        let identifier = identifier.into();
        if fragments.is_empty() {
            return Err(ErpError::InvariantViolation(format!(
                "resource {identifier} needs at least one fragment"
            )));
        }
        Ok(Self {
            id: ResourceId(0),
            identifier,
            file_name: file_name.into(),
            resource_type: resource_type.into(),
            fragments,
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment(&self, index: usize) -> Option<&Fragment> {
        self.fragments.get(index)
    }

    /// Decompressed size over all fragments.
    pub fn size(&self) -> u64 {
        self.fragments.iter().map(Fragment::size).sum()
    }

    pub fn packed_size(&self) -> u64 {
        self.fragments.iter().map(Fragment::packed_size).sum()
    }

    pub(crate) fn set_identifier(&mut self, identifier: String) {
        self.identifier = identifier;
    }

    pub(crate) fn set_file_name(&mut self, file_name: String) {
        self.file_name = file_name;
    }

    pub(crate) fn set_resource_type(&mut self, resource_type: String) {
        self.resource_type = resource_type;
    }

    pub(crate) fn fragments_mut(&mut self) -> &mut Vec<Fragment> {
        &mut self.fragments
    }
}

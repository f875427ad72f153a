use serde::{Deserialize, Serialize};

use crate::codec::CodecId;

/// Largest decompressed fragment size a container may declare.
pub const MAX_FRAGMENT_SIZE: u64 = 1 << 40;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FragmentEntry {
    pub name: String,
    pub codec: CodecId,
    /// Decompressed length.
    pub size: u64,
    /// Stored length in the data region.
    pub packed_size: u64,
    /// Relative to the start of the data region.
    pub offset: u64,
    /// blake3 of the stored bytes.
    pub blake3: [u8; 32],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub identifier: String,
    pub file_name: String,
    pub resource_type: String,
    pub fragments: Vec<FragmentEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    /// Unix seconds; zero for deterministic output.
    pub created: i64,
    pub tool: String,
    /// zstd level the archive was edited with.
    pub codec_level: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub resources: Vec<ResourceEntry>,
    pub meta: Meta,
}

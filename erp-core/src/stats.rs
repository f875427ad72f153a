use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub resources: u64,
    pub fragments: u64,
    pub compressed_fragments: u64,
    pub logical_bytes: u64,
    pub packed_bytes: u64,
    pub compression_ratio: f32,
}

// erp_core/src/domain.rs
use crate::codec::CodecId;
use crate::model::resource::ResourceId;

#[derive(Clone, Debug)]
pub struct ResourceRow {
    pub id: ResourceId,
    pub identifier: String,
    pub file_name: String,
    pub resource_type: String,
    pub fragments: usize,
    pub size: u64,
    pub packed_size: u64,
}

#[derive(Clone, Debug)]
pub struct FragmentRow {
    pub ordinal: usize,
    pub name: String,
    pub codec: CodecId,
    pub size: u64,
    pub packed_size: u64,
    pub offset: u64,
}

#![forbid(unsafe_code)]

pub mod error;

pub mod codec;

pub mod model {
    pub mod archive;
    pub mod fragment;
    pub mod resource;
}

pub mod index {
    pub mod inmem;
}

pub mod edit {
    pub mod batch;
    pub mod quick;
}

pub mod container {
    pub mod manifest;
    pub mod reader;
    pub mod superblock;
    pub mod tail;
    pub mod writer;
}

pub mod transfer;

pub mod domain;
pub mod stats;

// Re-exports: stable API surface
pub use codec::{CodecId, CodecOptions};
pub use container::reader::{ContainerInfo, inspect, load, parse, verify};
pub use container::writer::{SaveOptions, save, serialize};
pub use domain::{FragmentRow, ResourceRow};
pub use edit::batch::{BatchRename, BatchSummary, RenamePair};
pub use edit::quick::{DriverClothesSwap, replace_all, track_transform};
pub use error::{ErpError, Result, ValidationError};
pub use index::inmem::IdentifierIndex;
pub use model::archive::ArchiveFile;
pub use model::fragment::Fragment;
pub use model::resource::{Resource, ResourceId};
pub use stats::Stats;
pub use transfer::{
    CancelToken, ExportOptions, ImportOptions, ProgressEvent, ProgressSink, TransferReport,
};

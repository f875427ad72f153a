use std::borrow::Cow;

use crate::codec::{self, CodecId, CodecOptions};
use crate::error::{ErpError, Result};

/// One chunk of a resource's payload.
///
/// The stored buffer is owned by the fragment alone; cloning a fragment
/// copies the bytes, so two fragments never share storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    name: String,
    codec: CodecId,
    /// Decompressed length of the payload.
    size: u64,
    /// Position in the data region, valid after `ArchiveFile::update_offsets`.
    offset: u64,
    data: Vec<u8>,
}

impl Fragment {
    /// Build a fragment from plain bytes, compressing them when asked.
    pub fn new(name: impl Into<String>, bytes: &[u8], compress: bool) -> Result<Self> {
        let mut frag = Self {
            name: name.into(),
            codec: CodecId::Store,
            size: 0,
            offset: 0,
            data: Vec::new(),
        };
        frag.set_data(bytes, compress)?;
        Ok(frag)
    }

    /// Rebuild a fragment from bytes exactly as they sit in a container.
    pub(crate) fn from_stored(name: String, codec: CodecId, size: u64, data: Vec<u8>) -> Self {
        Self {
            name,
            codec,
            size,
            offset: 0,
            data,
        }
    }

    pub fn set_data(&mut self, bytes: &[u8], compress: bool) -> Result<()> {
        self.set_data_with(bytes, compress, &CodecOptions::default())
    }

    pub fn set_data_with(&mut self, bytes: &[u8], compress: bool, opts: &CodecOptions) -> Result<()> {
        let codec = if compress {
            CodecId::Zstd
        } else {
            CodecId::Store
        };
        self.data = codec::encode(codec, bytes, opts.level)?;
        self.codec = codec;
        self.size = bytes.len() as u64;
        Ok(())
    }

    /// Payload bytes. With `decompress` set a compressed payload is decoded
    /// first; otherwise the stored bytes are returned as they are.
    pub fn data_array(&self, decompress: bool) -> Result<Cow<'_, [u8]>> {
        if !decompress || !self.codec.is_compressed() {
            return Ok(Cow::Borrowed(&self.data));
        }
        let plain = codec::decode(self.codec, &self.data, self.size)?;
        if plain.len() as u64 != self.size {
            return Err(ErpError::Codec(format!(
                "fragment '{}' decoded to {} bytes, expected {}",
                self.name,
                plain.len(),
                self.size
            )));
        }
        Ok(Cow::Owned(plain))
    }

    /// Copy of this fragment with the payload pushed back through the codec,
    /// always stored compressed.
    pub fn recompressed(&self, opts: &CodecOptions) -> Result<Self> {
        let plain = self.data_array(true)?;
        let mut copy = Self {
            name: self.name.clone(),
            codec: CodecId::Store,
            size: 0,
            offset: 0,
            data: Vec::new(),
        };
        copy.set_data_with(&plain, true, opts)?;
        Ok(copy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> CodecId {
        self.codec
    }

    pub fn is_compressed(&self) -> bool {
        self.codec.is_compressed()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Length of the stored (possibly compressed) bytes.
    pub fn packed_size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn stored(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }
}

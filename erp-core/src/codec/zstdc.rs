use super::{CodecId, Compressor};
use crate::error::{ErpError, Result};
use std::io::{Read, Write};

pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn id(&self) -> CodecId {
        CodecId::Zstd
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: i32) -> Result<u64> {
        let mut enc = zstd::stream::Encoder::new(dst, level.max(1))
            .map_err(|e| ErpError::Codec(format!("zstd encoder: {e}")))?;
        let read = std::io::copy(src, &mut enc)?;
        enc.finish()
            .map_err(|e| ErpError::Codec(format!("zstd finish: {e}")))?;
        Ok(read)
    }

    // Decoder failures mean a corrupt stored frame.
    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64> {
        let mut dec = zstd::stream::Decoder::new(src)
            .map_err(|e| ErpError::Codec(format!("zstd decoder: {e}")))?;
        let written_uncompressed = std::io::copy(&mut dec, dst)
            .map_err(|e| ErpError::Codec(format!("zstd decode: {e}")))?;
        Ok(written_uncompressed)
    }
}

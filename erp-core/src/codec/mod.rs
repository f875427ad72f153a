use crate::error::{ErpError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecId {
    Store = 0,
    Zstd = 1,
}

impl CodecId {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(CodecId::Store),
            1 => Ok(CodecId::Zstd),
            x => Err(ErpError::Codec(format!("unknown codec id {x}"))),
        }
    }

    pub fn is_compressed(self) -> bool {
        self != CodecId::Store
    }
}

pub trait Compressor: Send + Sync {
    fn id(&self) -> CodecId;
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: i32) -> Result<u64>;
    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64>;
}

#[derive(Clone, Copy, Debug)]
pub struct CodecOptions {
    /// zstd level used when a fragment is stored compressed.
    pub level: i32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self { level: 3 }
    }
}

pub fn compressor_for(id: CodecId) -> &'static dyn Compressor {
    match id {
        CodecId::Store => &store::Store,
        CodecId::Zstd => &zstdc::ZstdCompressor,
    }
}

/// Encode a whole buffer with the given codec.
pub fn encode(id: CodecId, plain: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(plain.len() / 2 + 16);
    compressor_for(id).compress(&mut &plain[..], &mut out, level)?;
    Ok(out)
}

/// Largest up-front allocation `decode` makes from a caller's size hint.
const MAX_DECODE_RESERVE: u64 = 64 << 20;

/// Decode a whole buffer with the given codec. `size_hint` only sizes the
/// initial allocation and is not trusted.
pub fn decode(id: CodecId, stored: &[u8], size_hint: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size_hint.min(MAX_DECODE_RESERVE) as usize);
    compressor_for(id).decompress(&mut &stored[..], &mut out)?;
    Ok(out)
}

pub mod store;
pub mod zstdc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_id_from_u8() {
        assert_eq!(CodecId::from_u8(0).unwrap(), CodecId::Store);
        assert_eq!(CodecId::from_u8(1).unwrap(), CodecId::Zstd);
        assert!(matches!(CodecId::from_u8(9), Err(ErpError::Codec(_))));
    }

    #[test]
    fn zstd_round_trip() {
        let plain = b"mipmap mipmap mipmap mipmap mipmap".repeat(16);
        let packed = encode(CodecId::Zstd, &plain, 3).unwrap();
        assert!(packed.len() < plain.len());
        assert_eq!(decode(CodecId::Zstd, &packed, 0).unwrap(), plain);
    }

    #[test]
    fn zstd_rejects_garbage() {
        let err = decode(CodecId::Zstd, b"definitely not a zstd frame", 0).unwrap_err();
        assert!(matches!(err, ErpError::Codec(_)));
    }

    #[test]
    fn absurd_size_hint_is_not_trusted() {
        let packed = encode(CodecId::Zstd, b"tiny", 3).unwrap();
        assert_eq!(decode(CodecId::Zstd, &packed, u64::MAX).unwrap(), b"tiny");
    }
}

use std::io::{Read, Write};

pub const MAGIC: &[u8; 6] = b"ERPARC";
pub const VERSION: u16 = 1;
/// magic + version + manifest_len + data_off
pub const HEADER_LEN: u64 = 6 + 2 + 8 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub version: u16,
    /// Byte length of the CBOR manifest that follows the header.
    pub manifest_len: u64,
    /// Absolute offset of the first fragment byte.
    pub data_off: u64,
}

impl Superblock {
    pub fn new(manifest_len: u64) -> Self {
        Self {
            version: VERSION,
            manifest_len,
            data_off: HEADER_LEN + manifest_len,
        }
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.manifest_len.to_le_bytes())?;
        w.write_all(&self.data_off.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> std::io::Result<Self> {
        let mut magic = [0u8; 6];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not an ERP archive",
            ));
        }
        let mut v = [0u8; 2];
        r.read_exact(&mut v)?;
        let mut ml = [0u8; 8];
        r.read_exact(&mut ml)?;
        let mut doff = [0u8; 8];
        r.read_exact(&mut doff)?;
        Ok(Self {
            version: u16::from_le_bytes(v),
            manifest_len: u64::from_le_bytes(ml),
            data_off: u64::from_le_bytes(doff),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_has_fixed_length() {
        let mut buf = Vec::new();
        Superblock::new(10).write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, HEADER_LEN);
        let sb = Superblock::read_from(&buf[..]).unwrap();
        assert_eq!(sb.data_off, HEADER_LEN + 10);
    }

    #[test]
    fn foreign_magic_is_rejected() {
        let mut buf = vec![0u8; HEADER_LEN as usize];
        buf[..6].copy_from_slice(b"ARXALP");
        let err = Superblock::read_from(&buf[..]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}

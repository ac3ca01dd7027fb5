//! Low-level wire primitives.
//!
//! All multi-byte integers are little-endian. Arrays, byte buffers, and
//! strings carry an `i32` count prefix. GUIDs are 16 raw bytes.

use std::io::{Cursor, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use amaranth_scene::Guid;

use crate::error::StructuralError;

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

pub(crate) fn write_u8<W: Write>(w: &mut W, v: u8) -> std::io::Result<()> {
    w.write_u8(v)
}

pub(crate) fn write_u16<W: Write>(w: &mut W, v: u16) -> std::io::Result<()> {
    w.write_u16::<LE>(v)
}

pub(crate) fn write_u32<W: Write>(w: &mut W, v: u32) -> std::io::Result<()> {
    w.write_u32::<LE>(v)
}

pub(crate) fn write_u64<W: Write>(w: &mut W, v: u64) -> std::io::Result<()> {
    w.write_u64::<LE>(v)
}

pub(crate) fn write_i32<W: Write>(w: &mut W, v: i32) -> std::io::Result<()> {
    w.write_i32::<LE>(v)
}

pub(crate) fn write_i64<W: Write>(w: &mut W, v: i64) -> std::io::Result<()> {
    w.write_i64::<LE>(v)
}

pub(crate) fn write_f32<W: Write>(w: &mut W, v: f32) -> std::io::Result<()> {
    w.write_f32::<LE>(v)
}

pub(crate) fn write_f64<W: Write>(w: &mut W, v: f64) -> std::io::Result<()> {
    w.write_f64::<LE>(v)
}

pub(crate) fn write_len<W: Write>(w: &mut W, len: usize) -> std::io::Result<()> {
    write_i32(w, len as i32)
}

pub(crate) fn write_guid<W: Write>(w: &mut W, guid: Guid) -> std::io::Result<()> {
    w.write_all(&guid.to_bytes())
}

pub(crate) fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    write_len(w, bytes.len())?;
    w.write_all(bytes)
}

pub(crate) fn write_string<W: Write>(w: &mut W, s: &str) -> std::io::Result<()> {
    write_bytes(w, s.as_bytes())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// A bounds-checked reader over a document byte slice.
///
/// Every primitive read reports truncation with the offset it failed at;
/// count prefixes are validated against the remaining input before any
/// allocation.
pub(crate) struct WireReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }

    pub fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.offset()
    }

    fn truncated(&self, needed: usize) -> StructuralError {
        StructuralError::Truncated {
            offset: self.offset(),
            needed,
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, StructuralError> {
        self.cursor.read_u8().map_err(|_| self.truncated(1))
    }

    pub fn read_u16(&mut self) -> Result<u16, StructuralError> {
        self.cursor.read_u16::<LE>().map_err(|_| self.truncated(2))
    }

    pub fn read_u32(&mut self) -> Result<u32, StructuralError> {
        self.cursor.read_u32::<LE>().map_err(|_| self.truncated(4))
    }

    pub fn read_u64(&mut self) -> Result<u64, StructuralError> {
        self.cursor.read_u64::<LE>().map_err(|_| self.truncated(8))
    }

    pub fn read_i32(&mut self) -> Result<i32, StructuralError> {
        self.cursor.read_i32::<LE>().map_err(|_| self.truncated(4))
    }

    pub fn read_i64(&mut self) -> Result<i64, StructuralError> {
        self.cursor.read_i64::<LE>().map_err(|_| self.truncated(8))
    }

    pub fn read_f32(&mut self) -> Result<f32, StructuralError> {
        self.cursor.read_f32::<LE>().map_err(|_| self.truncated(4))
    }

    pub fn read_f64(&mut self) -> Result<f64, StructuralError> {
        self.cursor.read_f64::<LE>().map_err(|_| self.truncated(8))
    }

    /// Read and validate an `i32` count prefix. `min_element_size` bounds
    /// the count against the remaining input so a corrupt prefix fails
    /// here instead of as a huge allocation.
    pub fn read_len(&mut self, min_element_size: usize) -> Result<usize, StructuralError> {
        let offset = self.offset();
        let len = self.read_i32()?;
        if len < 0 {
            return Err(StructuralError::InvalidLength { offset, len });
        }
        let len = len as usize;
        if len.saturating_mul(min_element_size.max(1)) > self.remaining() {
            return Err(StructuralError::InvalidLength {
                offset,
                len: len as i32,
            });
        }
        Ok(len)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StructuralError> {
        use std::io::Read;
        let needed = buf.len();
        self.cursor.read_exact(buf).map_err(|_| self.truncated(needed))
    }

    pub fn read_guid(&mut self) -> Result<Guid, StructuralError> {
        let mut bytes = [0u8; 16];
        self.read_exact(&mut bytes)?;
        Ok(Guid::from_bytes(bytes))
    }

    pub fn read_byte_buf(&mut self) -> Result<Vec<u8>, StructuralError> {
        let len = self.read_len(1)?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_string(&mut self) -> Result<String, StructuralError> {
        let offset = self.offset();
        let bytes = self.read_byte_buf()?;
        String::from_utf8(bytes).map_err(|_| StructuralError::InvalidUtf8 { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_round_trip() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0xDEAD_BEEF).unwrap();
        write_i32(&mut buf, -7).unwrap();
        write_f64(&mut buf, 2.5).unwrap();
        let g = Guid::new();
        write_guid(&mut buf, g).unwrap();
        write_string(&mut buf, "hello").unwrap();

        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_i32().unwrap(), -7);
        assert_eq!(r.read_f64().unwrap(), 2.5);
        assert_eq!(r.read_guid().unwrap(), g);
        assert_eq!(r.read_string().unwrap(), "hello");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncation_reports_offset() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 1).unwrap();
        let mut r = WireReader::new(&buf[..2]);
        match r.read_u32() {
            Err(StructuralError::Truncated { needed: 4, .. }) => {}
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn negative_length_prefix_rejected() {
        let mut buf = Vec::new();
        write_i32(&mut buf, -5).unwrap();
        let mut r = WireReader::new(&buf);
        match r.read_byte_buf() {
            Err(StructuralError::InvalidLength { len: -5, .. }) => {}
            other => panic!("expected invalid length, got {other:?}"),
        }
    }

    #[test]
    fn oversized_length_prefix_rejected() {
        let mut buf = Vec::new();
        write_i32(&mut buf, 1_000_000).unwrap();
        buf.extend_from_slice(&[0; 4]);
        let mut r = WireReader::new(&buf);
        assert!(matches!(
            r.read_byte_buf(),
            Err(StructuralError::InvalidLength { .. })
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, &[0xFF, 0xFE]).unwrap();
        let mut r = WireReader::new(&buf);
        assert!(matches!(
            r.read_string(),
            Err(StructuralError::InvalidUtf8 { offset: 0 })
        ));
    }
}

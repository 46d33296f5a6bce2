//! Bounds-checked little-endian cursor over an in-memory byte buffer, plus
//! the growable writer counterpart.

use crate::Error;
use byteorder::{ByteOrder, LittleEndian};

/// Sequential/random-access reader over a fixed byte slice.
///
/// Every read and seek is bounds-checked; crossing the end of the buffer
/// fails with [`Error::OutOfBounds`] and the cursor is left where it was.
/// There is no recovery path: the formats this crate decodes chain offsets,
/// so callers must propagate the error rather than continue.
#[derive(Clone, Debug)]
pub struct BinaryReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], Error> {
        let end = self
            .offset
            .checked_add(count)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(Error::OutOfBounds {
                offset: self.offset,
                len: count,
                buffer_len: self.bytes.len(),
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// Zero-copy view of the next `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], Error> {
        self.take(count)
    }

    /// NUL-terminated string; bytes are decoded 1:1 (Latin-1), matching the
    /// ASCII decoding of the original data tools.
    pub fn read_string(&mut self) -> Result<String, Error> {
        let mut result = String::new();
        loop {
            let byte = self.read_u8()?;
            if byte == 0 {
                break;
            }
            result.push(byte as char);
        }
        Ok(result)
    }

    /// Fixed-length string; the byte count comes from a length prefix the
    /// caller has already consumed.
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String, Error> {
        Ok(decode_latin1(self.take(len)?))
    }

    pub fn seek(&mut self, offset: usize) -> Result<(), Error> {
        if offset > self.bytes.len() {
            return Err(Error::OutOfBounds {
                offset,
                len: 0,
                buffer_len: self.bytes.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<(), Error> {
        let target = self.offset.checked_add(count).ok_or(Error::OutOfBounds {
            offset: self.offset,
            len: count,
            buffer_len: self.bytes.len(),
        })?;
        self.seek(target)
    }
}

/// Growable little-endian byte buffer mirroring [`BinaryReader`]'s reads.
#[derive(Clone, Debug, Default)]
pub struct BinaryWriter {
    bytes: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.bytes.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.bytes.extend_from_slice(value.as_bytes());
    }

    /// String plus NUL terminator, the form every CString field uses.
    pub fn write_cstr(&mut self, value: &str) {
        self.write_str(value);
        self.bytes.push(0);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Materialize the written bytes as an exact-length buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

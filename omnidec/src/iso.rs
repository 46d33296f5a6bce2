//! ISO9660/Joliet disc image reader.
//!
//! Walks the volume's directory tree once at construction and maps posix-style
//! paths to `(sector, length)` extents; `open` then returns a zero-copy view
//! into the image buffer.

use crate::reader::decode_latin1;
use crate::{BinaryReader, Error};
use std::collections::HashMap;

pub const SECTOR_SIZE: usize = 2048;

/// Which directory structure of the disc to read.
///
/// `Iso9660` reads the primary volume descriptor (sector 16, ASCII names);
/// `Joliet` reads the supplementary descriptor (sector 17, UTF-16BE names).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IsoVariant {
    Iso9660,
    Joliet,
}

#[derive(Clone, Debug)]
pub struct DirectoryEntry {
    /// Extent start, in sectors.
    pub location: u32,
    /// Extent length, in bytes.
    pub length: u32,
    pub is_directory: bool,
}

pub struct Iso9660<'a> {
    bytes: &'a [u8],
    variant: IsoVariant,
    entries: HashMap<String, DirectoryEntry>,
}

impl<'a> Iso9660<'a> {
    pub fn parse(bytes: &'a [u8], variant: IsoVariant) -> Result<Self, Error> {
        let mut reader = BinaryReader::new(bytes);
        let sector = match variant {
            IsoVariant::Iso9660 => 16,
            IsoVariant::Joliet => 17,
        };
        reader.seek(sector * SECTOR_SIZE)?;
        let descriptor_type = reader.read_u8()?;
        let identifier = reader.read_bytes(5)?;
        let version = reader.read_u8()?;
        if identifier != b"CD001" {
            return Err(Error::InvalidVolume {
                message: format!("identifier {:?} is not CD001", decode_latin1(identifier)),
            });
        }
        if version != 1 {
            return Err(Error::InvalidVolume {
                message: format!("unsupported descriptor version {version}"),
            });
        }
        let expected_type = match variant {
            IsoVariant::Iso9660 => 1,
            IsoVariant::Joliet => 2,
        };
        if descriptor_type != expected_type {
            return Err(Error::InvalidVolume {
                message: format!(
                    "descriptor type {descriptor_type} does not match the requested variant (expected {expected_type})"
                ),
            });
        }

        // The root directory record sits at byte 156 of the descriptor; jump
        // straight to its extent fields (156 + 2).
        reader.skip(151)?;
        let root_location = reader.read_u32()?;
        reader.skip(4)?;
        let root_length = reader.read_u32()?;

        let mut iso = Self {
            bytes,
            variant,
            entries: HashMap::new(),
        };
        iso.read_dir(&mut reader, root_location, root_length, "")?;
        log::debug!("indexed {} directory entries", iso.entries.len());
        Ok(iso)
    }

    fn read_dir(
        &mut self,
        reader: &mut BinaryReader<'a>,
        start: u32,
        total: u32,
        path: &str,
    ) -> Result<(), Error> {
        let mut consumed: u32 = 0;
        while consumed < total {
            reader.seek(start as usize * SECTOR_SIZE + consumed as usize)?;
            let record_len = reader.read_u8()?;
            if record_len < 1 {
                // Zero-length padding: jump to the next sector boundary.
                consumed = (consumed / SECTOR_SIZE as u32 + 1) * SECTOR_SIZE as u32;
                continue;
            }
            reader.read_u8()?; // extended attribute record length
            let location = reader.read_u32()?;
            reader.skip(4)?; // big-endian half of the extent location
            let length = reader.read_u32()?;
            reader.skip(11)?; // big-endian half of the length + recording date
            let flags = reader.read_u8()?;
            reader.skip(6)?; // unit size, interleave gap, volume sequence number
            let name_len = reader.read_u8()?;
            let name_bytes = reader.read_bytes(name_len as usize)?;
            consumed += record_len as u32;

            // Self (0x00) and parent (0x01) records are never materialized.
            if name_bytes.len() == 1 && (name_bytes[0] == 0 || name_bytes[0] == 1) {
                continue;
            }

            let mut name = match self.variant {
                IsoVariant::Iso9660 => decode_latin1(name_bytes),
                IsoVariant::Joliet => decode_utf16be(name_bytes),
            };
            if let Some(stripped) = name.strip_suffix(";1") {
                name = stripped.to_string();
            }
            if let Some(stripped) = name.strip_suffix('\0') {
                name = stripped.to_string();
            }

            let full = format!("{path}{name}");
            let is_directory = flags & 0b10 != 0;
            self.entries.insert(
                full.clone(),
                DirectoryEntry {
                    location,
                    length,
                    is_directory,
                },
            );
            if is_directory {
                self.read_dir(reader, location, length, &format!("{full}/"))?;
            }
        }
        Ok(())
    }

    /// Raw bytes of the file stored at `path` (exact, case-sensitive match).
    pub fn open(&self, path: &str) -> Result<&'a [u8], Error> {
        let entry = self.entries.get(path).ok_or_else(|| Error::FileNotFound {
            path: path.to_string(),
        })?;
        let start = entry.location as usize * SECTOR_SIZE;
        let len = entry.length as usize;
        self.bytes
            .get(start..start + len)
            .ok_or(Error::OutOfBounds {
                offset: start,
                len,
                buffer_len: self.bytes.len(),
            })
    }

    pub fn entry(&self, path: &str) -> Option<&DirectoryEntry> {
        self.entries.get(path)
    }

    /// All discovered non-directory paths, sorted, for diagnostics.
    pub fn file_list(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_directory)
            .map(|(path, _)| path.as_str())
            .collect();
        files.sort_unstable();
        files
    }
}

fn decode_utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

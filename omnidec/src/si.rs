//! SI ("OMNI") interactive-media container parser.
//!
//! The container is a RIFF-derived chunk stream multiplexing an object tree
//! (`MxOb`) with the objects' streamed media payloads (`MxCh`). Payload
//! chunks arrive interleaved in disc order and are reassembled here into one
//! contiguous buffer per object.

use crate::reader::decode_latin1;
use crate::{BinaryReader, Error};
use std::collections::HashMap;

const HEADER_SIZE: usize = 8;
const CHUNK_HEADER_SIZE: u32 = 14;

const fn tag(bytes: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*bytes)
}

const TAG_RIFF: u32 = tag(b"RIFF");
const TAG_MX_HD: u32 = tag(b"MxHd");
const TAG_PAD: u32 = tag(b"pad ");
const TAG_MX_OF: u32 = tag(b"MxOf");
const TAG_LIST: u32 = tag(b"LIST");
const TAG_MX_ST: u32 = tag(b"MxSt");
const TAG_MX_CH: u32 = tag(b"MxCh");
const TAG_MX_OB: u32 = tag(b"MxOb");
const TAG_MX_DA: u32 = tag(b"MxDa");
const TAG_WAVE: u32 = tag(b"WAVE");
const TAG_FMT: u32 = tag(b"fmt ");
const TAG_DATA: u32 = tag(b"data");
const TAG_OMNI: u32 = tag(b"OMNI");

/// Known `MxHd` format versions. Only [`VERSION_2_2`] is supported.
pub const VERSION_2_1: u32 = 0x0001_0002;
pub const VERSION_2_2: u32 = 0x0002_0002;

/// Bits of [`ActionNode::flags`].
pub mod object_flags {
    pub const LOOP_CACHE: u32 = 0x01;
    pub const NO_LOOP: u32 = 0x02;
    pub const LOOP_STREAM: u32 = 0x04;
    pub const TRANSPARENT: u32 = 0x08;
}

mod chunk_flags {
    pub const END: u16 = 0x02;
    pub const SPLIT: u16 = 0x10;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ActionKind {
    Object,
    Action,
    MediaAction,
    Anim,
    Sound,
    MultiAction,
    SerialAction,
    ParallelAction,
    Event,
    SelectAction,
    Still,
    ObjectAction,
}

impl ActionKind {
    fn from_u16(value: u16, offset: usize) -> Result<Self, Error> {
        Ok(match value {
            0 => Self::Object,
            1 => Self::Action,
            2 => Self::MediaAction,
            3 => Self::Anim,
            4 => Self::Sound,
            5 => Self::MultiAction,
            6 => Self::SerialAction,
            7 => Self::ParallelAction,
            8 => Self::Event,
            9 => Self::SelectAction,
            10 => Self::Still,
            11 => Self::ObjectAction,
            _ => return Err(Error::UnknownActionType { value, offset }),
        })
    }

    /// Composite actions reference their members by child order and carry no
    /// source file of their own.
    pub fn has_file_info(self) -> bool {
        !matches!(
            self,
            Self::SerialAction | Self::ParallelAction | Self::SelectAction
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileType {
    Wav,
    Stl,
    Flc,
    Smk,
    Obj,
    Tve,
}

impl FileType {
    fn from_u32(value: u32, offset: usize) -> Result<Self, Error> {
        Ok(match value {
            0x5641_5720 => Self::Wav,
            0x4c54_5320 => Self::Stl,
            0x434c_4620 => Self::Flc,
            0x4b4d_5320 => Self::Smk,
            0x4a42_4f20 => Self::Obj,
            0x5456_4520 => Self::Tve,
            _ => return Err(Error::UnknownFileType { value, offset }),
        })
    }
}

#[derive(Clone, Debug)]
pub struct FileInfo {
    pub filename: String,
    pub file_type: FileType,
    /// Only WAV actions carry a volume.
    pub volume: Option<u32>,
}

/// Streamed payload of an [`ActionNode`].
///
/// Append-only while the container is being walked, then frozen exactly once
/// when the walk completes. A finished payload cannot accept further writes.
#[derive(Clone, Debug)]
pub enum Payload {
    Building(Vec<u8>),
    Finished(Box<[u8]>),
}

impl Default for Payload {
    fn default() -> Self {
        Self::Building(Vec::new())
    }
}

impl Payload {
    fn append(&mut self, bytes: &[u8], offset: usize) -> Result<(), Error> {
        match self {
            Self::Building(buffer) => {
                buffer.extend_from_slice(bytes);
                Ok(())
            }
            Self::Finished(_) => Err(Error::Malformed {
                message: "data chunk addressed to a finished payload".to_string(),
                offset,
            }),
        }
    }

    fn finish(&mut self) {
        if let Self::Building(buffer) = self {
            *self = Self::Finished(std::mem::take(buffer).into_boxed_slice());
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    /// The reassembled bytes, once finished.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Building(_) => None,
            Self::Finished(bytes) => Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Building(buffer) => buffer.len(),
            Self::Finished(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One node of the container's object tree.
///
/// Children are arena indices into [`SiFile::objects`]; use
/// [`SiFile::children`] to resolve them.
#[derive(Clone, Debug)]
pub struct ActionNode {
    pub id: u32,
    pub kind: ActionKind,
    pub presenter: String,
    pub name: String,
    pub flags: u32,
    pub duration: u32,
    pub loop_count: u32,
    pub location: [f64; 3],
    pub direction: [f64; 3],
    pub up: [f64; 3],
    /// Free-form "key:value" pairs, trailing NUL stripped.
    pub extra_data: String,
    pub file_info: Option<FileInfo>,
    /// Declared total size of each delivery unit, in stream order. Callers
    /// use these to slice the concatenated payload into sub-resources (e.g.
    /// a WAV's header vs. data region).
    pub chunk_sizes: Vec<u32>,
    pub children: Vec<usize>,
    pub payload: Payload,
}

/// A fully parsed SI container: the object arena plus id lookup.
#[derive(Debug)]
pub struct SiFile {
    version: u32,
    buffer_size: u32,
    nodes: Vec<ActionNode>,
    index_by_id: HashMap<u32, usize>,
    roots: Vec<usize>,
}

impl SiFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let mut parser = Parser {
            reader: BinaryReader::new(bytes),
            version: 0,
            buffer_size: 0,
            split_bytes_written: 0,
            nodes: Vec::new(),
            index_by_id: HashMap::new(),
            roots: Vec::new(),
        };
        let mut parents = Vec::new();
        parser.read_chunk(&mut parents)?;
        for node in &mut parser.nodes {
            node.payload.finish();
        }
        log::debug!(
            "parsed SI container: {} objects, {} roots",
            parser.nodes.len(),
            parser.roots.len()
        );
        Ok(Self {
            version: parser.version,
            buffer_size: parser.buffer_size,
            nodes: parser.nodes,
            index_by_id: parser.index_by_id,
            roots: parser.roots,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn object(&self, id: u32) -> Option<&ActionNode> {
        self.index_by_id.get(&id).map(|&index| &self.nodes[index])
    }

    pub fn objects(&self) -> impl Iterator<Item = &ActionNode> {
        self.nodes.iter()
    }

    pub fn roots(&self) -> impl Iterator<Item = &ActionNode> {
        self.roots.iter().map(|&index| &self.nodes[index])
    }

    pub fn children<'s>(&'s self, node: &'s ActionNode) -> impl Iterator<Item = &'s ActionNode> {
        node.children.iter().map(|&index| &self.nodes[index])
    }
}

struct Parser<'a> {
    reader: BinaryReader<'a>,
    version: u32,
    buffer_size: u32,
    /// Bytes written so far for the current split delivery; resets to zero
    /// once the declared total has been satisfied.
    split_bytes_written: u32,
    nodes: Vec<ActionNode>,
    index_by_id: HashMap<u32, usize>,
    roots: Vec<usize>,
}

impl<'a> Parser<'a> {
    fn read_chunk(&mut self, parents: &mut Vec<usize>) -> Result<(), Error> {
        let start = self.reader.position();
        let chunk_tag = self.reader.read_u32()?;
        let size = self.reader.read_u32()?;
        let end = start + HEADER_SIZE + size as usize;
        let mut current = None;

        match chunk_tag {
            TAG_RIFF => {
                let identifier = self.reader.read_bytes(4)?;
                if identifier != b"OMNI" {
                    return Err(Error::InvalidMagic {
                        expected: "OMNI".to_string(),
                        found: decode_latin1(identifier),
                        offset: start + HEADER_SIZE,
                    });
                }
            }
            TAG_MX_HD => {
                let version = self.reader.read_u32()?;
                if version != VERSION_2_2 {
                    return Err(Error::UnsupportedVersion { version });
                }
                self.version = version;
                self.buffer_size = self.reader.read_u32()?;
                self.reader.skip(4)?;
            }
            TAG_PAD | TAG_MX_OF => {
                self.reader.skip(size as usize)?;
            }
            TAG_LIST => {
                let list_id: [u8; 4] = self.reader.read_bytes(4)?.try_into().unwrap_or([0; 4]);
                if list_id == *b"MxCh" {
                    let variant: [u8; 4] =
                        self.reader.read_bytes(4)?.try_into().unwrap_or([0; 4]);
                    if variant == *b"Act\0" || variant == *b"RAND" {
                        if variant == *b"RAND" {
                            self.reader.skip(5)?;
                        }
                        let count = self.reader.read_u32()?;
                        self.reader.skip(2 * count as usize)?;
                    }
                }
            }
            TAG_MX_ST | TAG_MX_DA | TAG_WAVE | TAG_FMT | TAG_DATA | TAG_OMNI => {}
            TAG_MX_OB => {
                current = Some(self.read_object(parents)?);
            }
            TAG_MX_CH => {
                self.read_data_chunk(size, start)?;
            }
            _ => {
                return Err(Error::UnknownChunk {
                    tag: chunk_tag,
                    offset: start,
                });
            }
        }

        if let Some(index) = current {
            parents.push(index);
        }
        while self.reader.position() + HEADER_SIZE < end {
            // The disc streams the container in fixed-size buffers; a header
            // never straddles a buffer boundary, so neither may the cursor.
            if self.buffer_size > 0 {
                let offset = self.reader.position() % self.buffer_size as usize;
                if offset + HEADER_SIZE > self.buffer_size as usize {
                    self.reader.skip(self.buffer_size as usize - offset)?;
                }
            }
            self.read_chunk(parents)?;
        }
        if current.is_some() {
            parents.pop();
        }

        self.reader.seek(end)?;
        if size % 2 == 1 {
            self.reader.skip(1)?;
        }
        Ok(())
    }

    fn read_object(&mut self, parents: &[usize]) -> Result<usize, Error> {
        let kind_offset = self.reader.position();
        let kind = ActionKind::from_u16(self.reader.read_u16()?, kind_offset)?;
        let presenter = self.reader.read_string()?;
        self.reader.skip(4)?;
        let name = self.reader.read_string()?;
        let id = self.reader.read_u32()?;
        let flags = self.reader.read_u32()?;
        self.reader.skip(4)?;
        let duration = self.reader.read_u32()?;
        let loop_count = self.reader.read_u32()?;
        let mut coords = [0f64; 9];
        for coord in &mut coords {
            *coord = self.reader.read_f64()?;
        }
        let extra_len = self.reader.read_u16()?;
        let mut extra_data = self.reader.read_fixed_string(extra_len as usize)?;
        if extra_data.ends_with('\0') {
            extra_data.pop();
        }

        let file_info = if kind.has_file_info() {
            let filename = self.reader.read_string()?;
            self.reader.skip(12)?;
            let type_offset = self.reader.position();
            let file_type = FileType::from_u32(self.reader.read_u32()?, type_offset)?;
            self.reader.skip(8)?;
            let volume = if file_type == FileType::Wav {
                Some(self.reader.read_u32()?)
            } else {
                None
            };
            Some(FileInfo {
                filename,
                file_type,
                volume,
            })
        } else {
            None
        };

        let index = self.nodes.len();
        self.nodes.push(ActionNode {
            id,
            kind,
            presenter,
            name,
            flags,
            duration,
            loop_count,
            location: [coords[0], coords[1], coords[2]],
            direction: [coords[3], coords[4], coords[5]],
            up: [coords[6], coords[7], coords[8]],
            extra_data,
            file_info,
            chunk_sizes: Vec::new(),
            children: Vec::new(),
            payload: Payload::default(),
        });
        self.index_by_id.insert(id, index);
        match parents.last() {
            Some(&parent) => self.nodes[parent].children.push(index),
            None => self.roots.push(index),
        }
        Ok(index)
    }

    fn read_data_chunk(&mut self, size: u32, start: usize) -> Result<(), Error> {
        let flags = self.reader.read_u16()?;
        let id = self.reader.read_u32()?;
        self.reader.skip(4)?;
        let total_size = self.reader.read_u32()?;
        let body_len = size
            .checked_sub(CHUNK_HEADER_SIZE)
            .ok_or_else(|| Error::Malformed {
                message: format!("MxCh size {size} is shorter than its header"),
                offset: start,
            })?;
        let data = self.reader.read_bytes(body_len as usize)?;

        // End-flagged chunks are sentinels; their bytes are discarded.
        if flags & chunk_flags::END != 0 {
            return Ok(());
        }

        let index = *self
            .index_by_id
            .get(&id)
            .ok_or(Error::MissingObject { id, offset: start })?;
        let node = &mut self.nodes[index];
        node.payload.append(data, start)?;
        if self.split_bytes_written == 0 {
            node.chunk_sizes.push(total_size);
        }
        if flags & chunk_flags::SPLIT != 0 {
            self.split_bytes_written += body_len;
            if self.split_bytes_written >= total_size {
                self.split_bytes_written = 0;
            }
        }
        Ok(())
    }
}

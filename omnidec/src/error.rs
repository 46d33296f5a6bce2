use thiserror::Error;

/// Every variant is fatal to the parse or decode call that raised it. The
/// formats are offset-chained, so a misread section corrupts every later
/// read; callers should treat any error as "this asset is unusable".
#[derive(Debug, Error)]
pub enum Error {
    #[error("read of {len} bytes at offset {offset} crosses the end of a {buffer_len}-byte buffer")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    #[error("invalid volume descriptor: {message}")]
    InvalidVolume { message: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("unsupported container version {version:#010x}")]
    UnsupportedVersion { version: u32 },

    #[error("unknown chunk {tag:#010x} at offset {offset:#x}")]
    UnknownChunk { tag: u32, offset: usize },

    #[error("data chunk references undeclared object {id} at offset {offset:#x}")]
    MissingObject { id: u32, offset: usize },

    #[error("unknown action type {value} at offset {offset:#x}")]
    UnknownActionType { value: u16, offset: usize },

    #[error("unknown file type tag {value:#010x} at offset {offset:#x}")]
    UnknownFileType { value: u32, offset: usize },

    #[error("expected version {expected}, found {found} at offset {offset:#x}")]
    InvalidVersion {
        expected: u32,
        found: u32,
        offset: usize,
    },

    #[error("invalid flags {value:#010x} at offset {offset:#x}")]
    InvalidFlags { value: u32, offset: usize },

    #[error("{what} count mismatch: expected {expected}, found {found} at offset {offset:#x}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
        offset: usize,
    },

    #[error("unknown actor type {value} at offset {offset:#x}")]
    UnknownActorType { value: u32, offset: usize },

    #[error("unknown shading {value} at offset {offset:#x}")]
    UnknownShading { value: i8, offset: usize },

    #[error("{what} {index} out of range (limit {len}) at offset {offset:#x}")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
        offset: usize,
    },

    #[error("texture '{name}' not found in {pool} textures")]
    TextureNotFound { name: String, pool: &'static str },

    #[error("invalid magic: expected {expected}, found {found} at offset {offset:#x}")]
    InvalidMagic {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("audio streams are not supported (flags {flags:#x} at offset {offset:#x})")]
    UnsupportedAudio { flags: u32, offset: usize },

    #[error("width and height must be multiples of 4, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("invalid macroblock type {value} at offset {offset:#x}")]
    InvalidBlockType { value: u16, offset: usize },

    #[error("invalid opcode {opcode:#06x} at offset {offset:#x}")]
    InvalidOpcode { opcode: u16, offset: usize },

    #[error("all {frames} frames have been decoded")]
    AllFramesDecoded { frames: usize },

    #[error("malformed data at offset {offset:#x}: {message}")]
    Malformed { message: String, offset: usize },
}

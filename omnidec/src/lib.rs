//! Decoders for the OMNI-era interactive-media CD-ROM asset formats.
//!
//! Everything here is IO-free and renderer-agnostic: callers fetch a byte
//! buffer (from a disc image via [`Iso9660`], or any other source) and hand
//! it to the parser for its format. All parsing is synchronous and
//! single-pass; decoded structures are immutable once construction returns.

#![forbid(unsafe_code)]

mod error;
mod flc;
mod iso;
mod reader;
mod si;
mod smk;
mod wdb;

pub use error::*;
pub use flc::*;
pub use iso::*;
pub use reader::*;
pub use si::*;
pub use smk::*;
pub use wdb::*;

#[cfg(test)]
mod reader_tests;



#[cfg(test)]
mod wdb_tests;

#[cfg(test)]
mod smk_tests;

//! Reader and writer for the header of Dremel `.g3drem` print files.
//!
//! A g3drem file is a 58-byte little-endian metadata record, followed by a
//! bitmap thumbnail, followed by plain ASCII G-code:
//!
//! ```text
//!  0  magic "g3drem 1.0      "     16 bytes
//! 16  thumbnail/image/gcode offsets  3 x u32
//! 28  seconds, right/left material   3 x u32
//! 40  flags + print settings         8 x u16
//! 56  right/left material type       2 x u8
//! 58  thumbnail bitmap               N bytes
//! 58+N G-code
//! ```
//!
//! [`G3dremHeader`] is built with setters and written with
//! [`G3dremHeader::write_header`]; [`parse_file`] reads it back.

mod decode;
mod error;
mod header;

pub use decode::{parse_file, G3dremFile};
pub use error::{HeaderError, Result};
pub use header::G3dremHeader;

/// File magic, space padded to 16 bytes.
pub const MAGIC: &[u8; 16] = b"g3drem 1.0      ";

/// Size of the fixed part of the header; the thumbnail starts here.
pub const FIXED_HEADER_LEN: usize = 16 + 6 * 4 + 8 * 2 + 2;

/// Thumbnail width expected by the printer.
pub const THUMBNAIL_WIDTH: u32 = 80;

/// Thumbnail height expected by the printer.
pub const THUMBNAIL_HEIGHT: u32 = 60;

/// Size of an 80x60 24-bit BMP: 54-byte file/info header plus pixel data.
pub const DEFAULT_THUMBNAIL_LEN: usize =
    (THUMBNAIL_WIDTH * THUMBNAIL_HEIGHT * 3) as usize + 54;

/// Filament loaded in an extruder, as stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialType {
    Abs,
    Pla,
    Dissolvable,
    /// No material / extruder not fitted.
    None,
    /// A code this crate does not know about, kept so foreign files still
    /// parse.
    Other(u8),
}

impl MaterialType {
    /// The single-byte code written to the file.
    pub fn code(self) -> u8 {
        match self {
            Self::Abs => 0x00,
            Self::Pla => 0x01,
            Self::Dissolvable => 0x02,
            Self::None => 0xFF,
            Self::Other(code) => code,
        }
    }

    /// Map a byte from the file back to a material.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Abs,
            0x01 => Self::Pla,
            0x02 => Self::Dissolvable,
            0xFF => Self::None,
            other => Self::Other(other),
        }
    }

    /// Guess the material from a slicer material profile name.
    ///
    /// Only ABS is distinguished; everything else prints as PLA.
    pub fn from_profile_name(name: &str) -> Self {
        if name.contains("ABS") {
            Self::Abs
        } else {
            Self::Pla
        }
    }
}

/// The `informationFlags` bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InformationFlags(u16);

impl InformationFlags {
    pub const RIGHT_EXTRUDER: u16 = 0x01;
    pub const LEFT_EXTRUDER: u16 = 0x02;
    pub const HEATED_BED: u16 = 0x04;
    pub const SUPPORT: u16 = 0x08;

    /// Build the flags for a job. The right extruder bit is always set.
    pub fn new(left_extruder: bool, heated_bed: bool, support: bool) -> Self {
        let mut bits = Self::RIGHT_EXTRUDER;
        if left_extruder {
            bits |= Self::LEFT_EXTRUDER;
        }
        if heated_bed {
            bits |= Self::HEATED_BED;
        }
        if support {
            bits |= Self::SUPPORT;
        }
        Self(bits)
    }

    /// Wrap raw bits read from a file.
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }
}

impl Default for InformationFlags {
    fn default() -> Self {
        Self(Self::RIGHT_EXTRUDER)
    }
}

/// Convert a slicer value into a 16-bit header field, refusing to truncate.
pub fn checked_u16(field: &'static str, value: i64) -> Result<u16> {
    u16::try_from(value).map_err(|_| HeaderError::FieldOverflow { field, value })
}

/// Convert a slicer value into a 32-bit header field, refusing to truncate.
pub fn checked_u32(field: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| HeaderError::FieldOverflow { field, value })
}

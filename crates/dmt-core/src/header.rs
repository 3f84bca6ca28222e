//! Fixed file prologue and the DM3/DM4 size-width policy.
//!
//! ```text
//! DM3: u32 version=3 | u32 size | u32 byte order
//! DM4: u32 version=4 | u64 size | u32 byte order
//! ```
//!
//! Structural fields are big-endian in both variants; the byte order flag
//! only applies to leaf payloads.

use crate::cursor::ByteCursor;
use crate::error::{Result, TagError};

/// Bytes not covered by the declared size in DM3: the header plus a zero trailer.
pub const REPORTED_SIZE_OFFSET_DM3: u64 = 16;
/// Same for DM4.
pub const REPORTED_SIZE_OFFSET_DM4: u64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Version 3, 32-bit counts and lengths.
    Dm3,
    /// Version 4, 64-bit counts and lengths.
    Dm4,
}

impl Variant {
    pub fn from_version(version: u32) -> Result<Self> {
        match version {
            3 => Ok(Variant::Dm3),
            4 => Ok(Variant::Dm4),
            got => Err(TagError::UnsupportedVersion { got }),
        }
    }

    pub fn version(self) -> u32 {
        match self {
            Variant::Dm3 => 3,
            Variant::Dm4 => 4,
        }
    }

    /// Width in bytes of counts, lengths and typespec words.
    pub fn word_size(self) -> u64 {
        match self {
            Variant::Dm3 => 4,
            Variant::Dm4 => 8,
        }
    }

    /// Read a count/length/typespec word of this variant's width.
    pub fn read_word(self, cursor: &mut ByteCursor<'_>) -> Result<u64> {
        match self {
            Variant::Dm3 => cursor.read_u32_be().map(u64::from),
            Variant::Dm4 => cursor.read_u64_be(),
        }
    }

    pub fn write_word(self, out: &mut Vec<u8>, v: u64) -> Result<()> {
        match self {
            Variant::Dm3 => {
                let v = u32::try_from(v)
                    .map_err(|_| TagError::unencodable(format!("{v} does not fit a DM3 word")))?;
                out.extend_from_slice(&v.to_be_bytes());
            }
            Variant::Dm4 => out.extend_from_slice(&v.to_be_bytes()),
        }
        Ok(())
    }

    /// Bytes before the root group.
    pub fn header_len(self) -> u64 {
        4 + self.word_size() + 4
    }

    pub fn reported_size_offset(self) -> u64 {
        match self {
            Variant::Dm3 => REPORTED_SIZE_OFFSET_DM3,
            Variant::Dm4 => REPORTED_SIZE_OFFSET_DM4,
        }
    }

    /// Zero bytes real writers put after the root group.
    pub fn trailer_len(self) -> u64 {
        self.reported_size_offset() - self.header_len()
    }

    pub fn extension(self) -> &'static str {
        match self {
            Variant::Dm3 => "dm3",
            Variant::Dm4 => "dm4",
        }
    }
}

/// Byte order of leaf payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    pub fn from_flag(flag: u32) -> Result<Self> {
        match flag {
            0 => Ok(Endianness::Big),
            1 => Ok(Endianness::Little),
            flag => Err(TagError::InvalidFileType { flag }),
        }
    }

    pub fn flag(self) -> u32 {
        match self {
            Endianness::Big => 0,
            Endianness::Little => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub variant: Variant,
    pub declared_size: u64,
    pub endianness: Endianness,
}

impl ContainerHeader {
    /// Read the prologue and check it against the full buffer length.
    ///
    /// The cursor must sit at the start of the buffer.
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let actual = (cursor.pos() + cursor.remaining()) as u64;
        let version = cursor.read_u32_be()?;
        let variant = Variant::from_version(version)?;
        let declared_size = variant.read_word(cursor)?;
        let endianness = Endianness::from_flag(cursor.read_u32_be()?)?;

        let expected = declared_size.checked_add(variant.reported_size_offset());
        let ok = match (variant, expected) {
            (_, None) => false,
            (Variant::Dm3, Some(expected)) => expected <= actual,
            (Variant::Dm4, Some(expected)) => expected == actual,
        };
        if !ok {
            return Err(TagError::SizeMismatch {
                declared: expected.unwrap_or(u64::MAX),
                actual,
            });
        }
        tracing::debug!(?variant, declared_size, ?endianness, "read header");
        Ok(Self {
            variant,
            declared_size,
            endianness,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.variant.version().to_be_bytes());
        self.variant.write_word(out, self.declared_size)?;
        out.extend_from_slice(&self.endianness.flag().to_be_bytes());
        Ok(())
    }
}

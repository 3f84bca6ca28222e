//! Error type shared by every reader in the crate.

use std::io;
use thiserror::Error;

/// Everything that can go wrong while reading (or writing) a tag tree.
///
/// All parse errors are fatal: the first one aborts the whole file and the
/// partially built tree is dropped.
#[derive(Debug, Error)]
pub enum TagError {
    /// The buffer ran out before a fixed-size field or a payload.
    #[error("truncated: needed {needed} bytes at offset {at_offset:#x}")]
    Truncated { at_offset: usize, needed: u64 },

    /// Tag type did not start with `%%%%`.
    #[error("tag type at offset {at_offset:#x} does not start with marker '%%%%' (found {found:#010x})")]
    BadMarker { at_offset: usize, found: u32 },

    /// Typespec grammar violated: empty, over/under-consumed, or overflowing.
    #[error("invalid tag type definition in entry '{path}'")]
    InvalidTag { path: String },

    #[error("invalid or unsupported tag type {code} in entry '{path}'")]
    InvalidOrUnsupportedType { code: u64, path: String },

    #[error("tag entry kind {code} at offset {at_offset:#x} is neither group nor data")]
    NotGroupOrLeaf { code: u8, at_offset: usize },

    #[error("unsupported container version {got}")]
    UnsupportedVersion { got: u32 },

    #[error("not a DM3/DM4 file: byte order flag {flag}")]
    InvalidFileType { flag: u32 },

    /// Declared size in the header disagrees with the real buffer length.
    #[error("expected file size from header is {declared} bytes, but the real size is {actual} bytes")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("nesting deeper than {limit} levels in entry '{path}'")]
    TooDeeplyNested { limit: usize, path: String },

    #[error("cannot encode tag tree: {reason}")]
    Unencodable { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for tag tree operations.
pub type Result<T> = std::result::Result<T, TagError>;

impl TagError {
    pub(crate) fn invalid_tag() -> Self {
        TagError::InvalidTag {
            path: String::new(),
        }
    }

    /// Fill in the entry path for errors raised below the level that knows it.
    pub(crate) fn at_path(self, at: &str) -> Self {
        match self {
            TagError::InvalidTag { path } if path.is_empty() => TagError::InvalidTag {
                path: at.to_string(),
            },
            TagError::InvalidOrUnsupportedType { code, path } if path.is_empty() => {
                TagError::InvalidOrUnsupportedType {
                    code,
                    path: at.to_string(),
                }
            }
            TagError::TooDeeplyNested { limit, path } if path.is_empty() => {
                TagError::TooDeeplyNested {
                    limit,
                    path: at.to_string(),
                }
            }
            other => other,
        }
    }

    pub(crate) fn unencodable(reason: impl Into<String>) -> Self {
        TagError::Unencodable {
            reason: reason.into(),
        }
    }
}

//! Cheap "is this a DM file" check on the first bytes of a file.

use std::path::Path;

use crate::header::{REPORTED_SIZE_OFFSET_DM3, REPORTED_SIZE_OFFSET_DM4, Variant};

/// Score for a header that checks out.
pub const SCORE_CONTENT: u32 = 100;
/// Score for a matching extension alone.
pub const SCORE_NAME: u32 = 15;

/// Smallest possible files: header, root flags and an empty entry count.
const MIN_FILE_SIZE_DM3: u64 = 3 * 4 + 1 + 1 + 4;
const MIN_FILE_SIZE_DM4: u64 = 2 * 4 + 8 + 1 + 1 + 4;

/// DM3 writers put up to this many bytes outside the declared size.
const REPORTED_SIZE_OFFSET_DM3_MAX: u64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub variant: Variant,
    pub score: u32,
}

/// Classify a file from its name, leading bytes and total size.
///
/// `head` only needs to cover the header and root flags; a content match
/// wins over an extension match.
pub fn detect(file_name: &str, head: &[u8], file_size: u64) -> Option<Detection> {
    if let Some(variant) = detect_content(head, file_size) {
        return Some(Detection {
            variant,
            score: SCORE_CONTENT,
        });
    }
    detect_name_only(file_name)
}

pub fn detect_name_only(file_name: &str) -> Option<Detection> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    let variant = if ext.eq_ignore_ascii_case("dm3") {
        Variant::Dm3
    } else if ext.eq_ignore_ascii_case("dm4") {
        Variant::Dm4
    } else {
        return None;
    };
    Some(Detection {
        variant,
        score: SCORE_NAME,
    })
}

fn detect_content(head: &[u8], file_size: u64) -> Option<Variant> {
    if !head.windows(4).any(|w| w == b"%%%%") {
        return None;
    }
    let version = u32::from_be_bytes(head.get(0..4)?.try_into().ok()?);
    match version {
        3 => {
            if file_size < MIN_FILE_SIZE_DM3 {
                return None;
            }
            let size = u64::from(u32::from_be_bytes(head.get(4..8)?.try_into().ok()?));
            let flags = head.get(8..14)?;
            let size_ok = size + REPORTED_SIZE_OFFSET_DM3_MAX >= file_size
                && size + REPORTED_SIZE_OFFSET_DM3 <= file_size;
            (size_ok && flags_ok(flags)).then_some(Variant::Dm3)
        }
        4 => {
            if file_size < MIN_FILE_SIZE_DM4 {
                return None;
            }
            let size = u64::from_be_bytes(head.get(4..12)?.try_into().ok()?);
            let flags = head.get(12..18)?;
            let size_ok = size.checked_add(REPORTED_SIZE_OFFSET_DM4) == Some(file_size);
            (size_ok && flags_ok(flags)).then_some(Variant::Dm4)
        }
        _ => None,
    }
}

/// Byte order word followed by the root group's sorted and open bytes.
fn flags_ok(flags: &[u8]) -> bool {
    let ordering = u32::from_be_bytes([flags[0], flags[1], flags[2], flags[3]]);
    ordering <= 1 && flags[4] <= 1 && flags[5] <= 1
}

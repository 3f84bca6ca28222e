//! Typespec grammar: descriptor codes and the recursive payload size resolver.
//!
//! A typespec is a flat pre-order encoding:
//!
//! ```text
//! atomic := <code 2..=12>
//! string := 18 <length in UTF-16 units>
//! array  := 20 <element typespec> <count>
//! struct := 15 <name length> <field count> (<field name length> <field typespec>)*
//! ```

use crate::error::{Result, TagError};

pub const SHORT: u64 = 2;
pub const LONG: u64 = 3;
pub const USHORT: u64 = 4;
pub const ULONG: u64 = 5;
pub const FLOAT: u64 = 6;
pub const DOUBLE: u64 = 7;
pub const BOOLEAN: u64 = 8;
pub const CHAR: u64 = 9;
pub const OCTET: u64 = 10;
pub const QUAD: u64 = 11;
pub const UQUAD: u64 = 12;
pub const STRUCT: u64 = 15;
pub const STRING: u64 = 18;
pub const ARRAY: u64 = 20;

/// Default ceiling for typespec recursion and group nesting.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AtomicType {
    Short = 2,
    Long = 3,
    UShort = 4,
    ULong = 5,
    Float = 6,
    Double = 7,
    Boolean = 8,
    Char = 9,
    Octet = 10,
    /// DM4 only.
    Quad = 11,
    /// DM4 only.
    UQuad = 12,
}

impl AtomicType {
    pub fn from_code(code: u64) -> Option<Self> {
        let t = match code {
            SHORT => AtomicType::Short,
            LONG => AtomicType::Long,
            USHORT => AtomicType::UShort,
            ULONG => AtomicType::ULong,
            FLOAT => AtomicType::Float,
            DOUBLE => AtomicType::Double,
            BOOLEAN => AtomicType::Boolean,
            CHAR => AtomicType::Char,
            OCTET => AtomicType::Octet,
            QUAD => AtomicType::Quad,
            UQUAD => AtomicType::UQuad,
            _ => return None,
        };
        Some(t)
    }

    pub fn code(self) -> u64 {
        self as u64
    }

    /// Payload size in bytes.
    pub fn size(self) -> u64 {
        match self {
            AtomicType::Boolean | AtomicType::Char | AtomicType::Octet => 1,
            AtomicType::Short | AtomicType::UShort => 2,
            AtomicType::Long | AtomicType::ULong | AtomicType::Float => 4,
            AtomicType::Double | AtomicType::Quad | AtomicType::UQuad => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AtomicType::Short => "short",
            AtomicType::Long => "long",
            AtomicType::UShort => "ushort",
            AtomicType::ULong => "ulong",
            AtomicType::Float => "float",
            AtomicType::Double => "double",
            AtomicType::Boolean => "bool",
            AtomicType::Char => "char",
            AtomicType::Octet => "octet",
            AtomicType::Quad => "quad",
            AtomicType::UQuad => "uquad",
        }
    }
}

/// Resolve the payload size of the descriptor at the start of `words`.
///
/// Returns the byte size and how many words the descriptor occupies; the
/// caller decides what to do with any words left over.
pub fn resolve(words: &[u64]) -> Result<(u64, usize)> {
    resolve_with_limit(words, DEFAULT_MAX_DEPTH)
}

pub fn resolve_with_limit(words: &[u64], max_depth: usize) -> Result<(u64, usize)> {
    let mut pos = 0;
    let size = type_size(words, &mut pos, 0, max_depth)?;
    Ok((size, pos))
}

/// Resolve a whole typespec, which must be exactly one descriptor.
pub fn resolve_exact(words: &[u64], max_depth: usize) -> Result<u64> {
    let (size, consumed) = resolve_with_limit(words, max_depth)?;
    if consumed != words.len() {
        tracing::debug!(consumed, total = words.len(), "typespec not fully consumed");
        return Err(TagError::invalid_tag());
    }
    Ok(size)
}

fn type_size(words: &[u64], pos: &mut usize, level: usize, max_depth: usize) -> Result<u64> {
    if level >= max_depth {
        return Err(TagError::TooDeeplyNested {
            limit: max_depth,
            path: String::new(),
        });
    }
    let rest = &words[*pos..];
    let Some(&primary) = rest.first() else {
        return Err(TagError::invalid_tag());
    };

    if let Some(atomic) = AtomicType::from_code(primary) {
        tracing::trace!(level, code = primary, "atomic type");
        *pos += 1;
        return Ok(atomic.size());
    }

    match primary {
        STRING => {
            if rest.len() < 2 {
                return Err(TagError::invalid_tag());
            }
            *pos += 2;
            // length is in UTF-16 units
            rest[1].checked_mul(2).ok_or_else(TagError::invalid_tag)
        }
        ARRAY => {
            if rest.len() < 3 {
                return Err(TagError::invalid_tag());
            }
            *pos += 1;
            let item_size = type_size(words, pos, level + 1, max_depth)?;
            let Some(&count) = words.get(*pos) else {
                return Err(TagError::invalid_tag());
            };
            *pos += 1;
            tracing::trace!(level, item_size, count, "array type");
            count.checked_mul(item_size).ok_or_else(TagError::invalid_tag)
        }
        STRUCT => {
            if rest.len() < 3 {
                return Err(TagError::invalid_tag());
            }
            let name_length = rest[1];
            let nfields = rest[2];
            *pos += 3;
            tracing::trace!(level, name_length, nfields, "struct type");
            let mut struct_size = name_length;
            for _ in 0..nfields {
                if words.len() - *pos < 2 {
                    return Err(TagError::invalid_tag());
                }
                let field_name_length = words[*pos];
                *pos += 1;
                let field_size = type_size(words, pos, level + 1, max_depth)?;
                struct_size = struct_size
                    .checked_add(field_name_length)
                    .and_then(|s| s.checked_add(field_size))
                    .ok_or_else(TagError::invalid_tag)?;
            }
            Ok(struct_size)
        }
        code => Err(TagError::InvalidOrUnsupportedType {
            code,
            path: String::new(),
        }),
    }
}

/// Human-readable rendering of a typespec, e.g. `array<ushort>[12]`.
pub fn describe(words: &[u64]) -> String {
    fn go(words: &[u64], pos: &mut usize, out: &mut String, depth: usize) -> Option<()> {
        if depth > DEFAULT_MAX_DEPTH {
            return None;
        }
        let primary = *words.get(*pos)?;
        *pos += 1;
        if let Some(a) = AtomicType::from_code(primary) {
            out.push_str(a.name());
            return Some(());
        }
        match primary {
            STRING => {
                let n = *words.get(*pos)?;
                *pos += 1;
                out.push_str(&format!("string[{n}]"));
            }
            ARRAY => {
                out.push_str("array<");
                go(words, pos, out, depth + 1)?;
                let n = *words.get(*pos)?;
                *pos += 1;
                out.push_str(&format!(">[{n}]"));
            }
            STRUCT => {
                let nfields = *words.get(*pos + 1)?;
                *pos += 2;
                out.push_str("struct{");
                for i in 0..nfields {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    *pos += 1;
                    go(words, pos, out, depth + 1)?;
                }
                out.push('}');
            }
            _ => return None,
        }
        Some(())
    }

    let mut out = String::new();
    let mut pos = 0;
    match go(words, &mut pos, &mut out, 0) {
        Some(()) if pos == words.len() => out,
        _ => format!("{words:?}"),
    }
}

/// True when a QUAD or UQUAD element appears anywhere in the typespec.
pub fn uses_quad(words: &[u64]) -> bool {
    fn go(words: &[u64], pos: &mut usize, depth: usize) -> Option<bool> {
        if depth > DEFAULT_MAX_DEPTH {
            return None;
        }
        let primary = *words.get(*pos)?;
        *pos += 1;
        if AtomicType::from_code(primary).is_some() {
            return Some(primary == QUAD || primary == UQUAD);
        }
        match primary {
            STRING => {
                *pos += 1;
                Some(false)
            }
            ARRAY => {
                let q = go(words, pos, depth + 1)?;
                *pos += 1;
                Some(q)
            }
            STRUCT => {
                let nfields = *words.get(*pos + 1)?;
                *pos += 2;
                let mut q = false;
                for _ in 0..nfields {
                    *pos += 1;
                    q |= go(words, pos, depth + 1)?;
                }
                Some(q)
            }
            _ => None,
        }
    }

    go(words, &mut 0, 0).unwrap_or(false)
}

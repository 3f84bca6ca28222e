//! Flattened `path -> leaf` lookup over a parsed tree.
//!
//! Keys join every label from the (empty) root label down with `/`, so a
//! leaf `Name` inside group `ImageList/#0` is found at `/ImageList/#0/Name`.
//! Lookups accept the key with or without the leading slash.

use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use indexmap::IndexMap;

use crate::header::Endianness;
use crate::tree::{TagGroup, TagNode, TagType};
use crate::typespec::{
    ARRAY, AtomicType, BOOLEAN, CHAR, DOUBLE, FLOAT, LONG, OCTET, QUAD, SHORT, STRING, ULONG, UQUAD, USHORT,
};
use crate::value::decode_utf16;

#[derive(Debug, Clone)]
pub struct PathIndex<'t, 'a> {
    endianness: Endianness,
    map: IndexMap<String, &'t TagType<'a>>,
}

impl<'t, 'a> PathIndex<'t, 'a> {
    /// Depth-first walk; a repeated path keeps the last leaf seen.
    pub fn build(root: &'t TagGroup<'a>, endianness: Endianness) -> Self {
        fn walk<'t, 'a>(
            group: &'t TagGroup<'a>,
            prefix: &mut String,
            map: &mut IndexMap<String, &'t TagType<'a>>,
        ) {
            for entry in &group.entries {
                let len = prefix.len();
                prefix.push('/');
                prefix.push_str(&entry.label);
                match &entry.node {
                    TagNode::Group(g) => walk(g, prefix, map),
                    TagNode::Leaf(t) => {
                        map.insert(prefix.clone(), t);
                    }
                }
                prefix.truncate(len);
            }
        }

        let mut map = IndexMap::new();
        walk(root, &mut String::new(), &mut map);
        tracing::debug!(leaves = map.len(), "built path index");
        Self { endianness, map }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Leaves in depth-first order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'t TagType<'a>)> + '_ {
        self.map.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn get(&self, path: &str) -> Option<&'t TagType<'a>> {
        let key: Cow<'_, str> = if path.starts_with('/') {
            Cow::Borrowed(path)
        } else {
            Cow::Owned(format!("/{path}"))
        };
        self.map.get(key.as_ref()).copied()
    }

    /// Leaf whose typespec matches `pattern`; `None` entries are wildcards.
    pub fn get_matching(&self, path: &str, pattern: &[Option<u64>]) -> Option<&'t TagType<'a>> {
        let t = self.get(path)?;
        if t.matches(pattern) {
            Some(t)
        } else {
            tracing::debug!(path, typespec = ?t.typespec, "typespec does not match");
            None
        }
    }

    fn scalar(&self, path: &str) -> Option<(u64, &'a [u8])> {
        let t = self.get(path)?;
        match t.typespec.as_slice() {
            [code] if AtomicType::from_code(*code)?.size() == t.payload.len() as u64 => {
                Some((*code, t.payload))
            }
            _ => None,
        }
    }

    pub fn get_uint(&self, path: &str) -> Option<u64> {
        let (code, p) = self.scalar(path)?;
        let v = match (code, self.endianness) {
            (USHORT, Endianness::Big) => u64::from(BigEndian::read_u16(p)),
            (USHORT, Endianness::Little) => u64::from(LittleEndian::read_u16(p)),
            (ULONG, Endianness::Big) => u64::from(BigEndian::read_u32(p)),
            (ULONG, Endianness::Little) => u64::from(LittleEndian::read_u32(p)),
            (UQUAD, Endianness::Big) => BigEndian::read_u64(p),
            (UQUAD, Endianness::Little) => LittleEndian::read_u64(p),
            (OCTET | BOOLEAN, _) => u64::from(p[0]),
            _ => return None,
        };
        Some(v)
    }

    pub fn get_int(&self, path: &str) -> Option<i64> {
        let (code, p) = self.scalar(path)?;
        let v = match (code, self.endianness) {
            (SHORT, Endianness::Big) => i64::from(BigEndian::read_i16(p)),
            (SHORT, Endianness::Little) => i64::from(LittleEndian::read_i16(p)),
            (LONG, Endianness::Big) => i64::from(BigEndian::read_i32(p)),
            (LONG, Endianness::Little) => i64::from(LittleEndian::read_i32(p)),
            (QUAD, Endianness::Big) => BigEndian::read_i64(p),
            (QUAD, Endianness::Little) => LittleEndian::read_i64(p),
            (CHAR | BOOLEAN, _) => i64::from(p[0]),
            _ => return None,
        };
        Some(v)
    }

    pub fn get_float(&self, path: &str) -> Option<f64> {
        let (code, p) = self.scalar(path)?;
        let v = match (code, self.endianness) {
            (FLOAT, Endianness::Big) => f64::from(BigEndian::read_f32(p)),
            (FLOAT, Endianness::Little) => f64::from(LittleEndian::read_f32(p)),
            (DOUBLE, Endianness::Big) => BigEndian::read_f64(p),
            (DOUBLE, Endianness::Little) => LittleEndian::read_f64(p),
            _ => return None,
        };
        Some(v)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        match self.scalar(path)? {
            (BOOLEAN, p) => Some(p[0] != 0),
            _ => None,
        }
    }

    /// Text stored either as a string or as an array of UTF-16 units.
    pub fn get_string(&self, path: &str) -> Option<String> {
        let t = self.get(path)?;
        let units = match t.typespec.as_slice() {
            [STRING, n] | [ARRAY, USHORT, n] => *n,
            _ => return None,
        };
        if units.checked_mul(2) != Some(t.payload.len() as u64) {
            return None;
        }
        decode_utf16(t.payload, self.endianness).ok()
    }
}

//! Decoding leaf payloads into typed values.
//!
//! Arrays of atomic elements stay zero-copy: image data arrays hold millions
//! of elements and are decoded one element at a time on demand.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Result, TagError};
use crate::header::Endianness;
use crate::tree::TagType;
use crate::typespec::{ARRAY, AtomicType, DEFAULT_MAX_DEPTH, STRING, STRUCT};

/// Upper bound on decoded list elements that occupy no payload bytes,
/// shared by every nesting level of one leaf.
const MAX_EMPTY_ELEMENTS: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Short(i16),
    Long(i32),
    UShort(u16),
    ULong(u32),
    Float(f32),
    Double(f64),
    Bool(bool),
    Char(u8),
    Octet(u8),
    Quad(i64),
    UQuad(u64),
}

impl Scalar {
    /// Decode one element; `bytes` must be exactly `ty.size()` long.
    pub fn decode(ty: AtomicType, bytes: &[u8], endianness: Endianness) -> Scalar {
        macro_rules! rd {
            ($f:ident) => {
                match endianness {
                    Endianness::Big => BigEndian::$f(bytes),
                    Endianness::Little => LittleEndian::$f(bytes),
                }
            };
        }
        match ty {
            AtomicType::Short => Scalar::Short(rd!(read_i16)),
            AtomicType::Long => Scalar::Long(rd!(read_i32)),
            AtomicType::UShort => Scalar::UShort(rd!(read_u16)),
            AtomicType::ULong => Scalar::ULong(rd!(read_u32)),
            AtomicType::Float => Scalar::Float(rd!(read_f32)),
            AtomicType::Double => Scalar::Double(rd!(read_f64)),
            AtomicType::Boolean => Scalar::Bool(bytes[0] != 0),
            AtomicType::Char => Scalar::Char(bytes[0]),
            AtomicType::Octet => Scalar::Octet(bytes[0]),
            AtomicType::Quad => Scalar::Quad(rd!(read_i64)),
            AtomicType::UQuad => Scalar::UQuad(rd!(read_u64)),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Short(v) => f64::from(v),
            Scalar::Long(v) => f64::from(v),
            Scalar::UShort(v) => f64::from(v),
            Scalar::ULong(v) => f64::from(v),
            Scalar::Float(v) => f64::from(v),
            Scalar::Double(v) => v,
            Scalar::Bool(v) => f64::from(u8::from(v)),
            Scalar::Char(v) | Scalar::Octet(v) => f64::from(v),
            Scalar::Quad(v) => v as f64,
            Scalar::UQuad(v) => v as f64,
        }
    }
}

/// Zero-copy view of an array of atomic elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayValue<'a> {
    pub element: AtomicType,
    pub len: usize,
    pub data: &'a [u8],
    pub endianness: Endianness,
}

impl<'a> ArrayValue<'a> {
    pub fn get(&self, i: usize) -> Option<Scalar> {
        if i >= self.len {
            return None;
        }
        let size = self.element.size() as usize;
        let bytes = self.data.get(i * size..(i + 1) * size)?;
        Some(Scalar::decode(self.element, bytes, self.endianness))
    }

    pub fn iter(&self) -> impl Iterator<Item = Scalar> + '_ {
        let element = self.element;
        let endianness = self.endianness;
        self.data
            .chunks_exact(element.size() as usize)
            .take(self.len)
            .map(move |c| Scalar::decode(element, c, endianness))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Scalar(Scalar),
    Text(String),
    Array(ArrayValue<'a>),
    /// Array of composite elements.
    List(Vec<Value<'a>>),
    /// Field values in declaration order.
    Struct(Vec<Value<'a>>),
}

impl<'a> TagType<'a> {
    /// Decode the payload according to the typespec.
    pub fn value(&self, endianness: Endianness) -> Result<Value<'a>> {
        let mut words = 0;
        let mut bytes = 0;
        let mut empty_left = MAX_EMPTY_ELEMENTS;
        let v = decode(self, &mut words, &mut bytes, &mut empty_left, endianness, 0)?;
        if words != self.typespec.len() || bytes != self.payload.len() {
            return Err(TagError::invalid_tag());
        }
        Ok(v)
    }
}

fn take<'a>(payload: &'a [u8], at: &mut usize, n: u64) -> Result<&'a [u8]> {
    let end = usize::try_from(n)
        .ok()
        .and_then(|n| at.checked_add(n))
        .filter(|&end| end <= payload.len())
        .ok_or(TagError::Truncated {
            at_offset: *at,
            needed: n,
        })?;
    let s = &payload[*at..end];
    *at = end;
    Ok(s)
}

fn word(ty: &TagType<'_>, at: &mut usize) -> Result<u64> {
    let w = *ty.typespec.get(*at).ok_or_else(TagError::invalid_tag)?;
    *at += 1;
    Ok(w)
}

/// Size of the descriptor starting at `at` without consuming it.
fn size_at(ty: &TagType<'_>, at: usize) -> Result<(u64, usize)> {
    crate::typespec::resolve(&ty.typespec[at..])
}

fn decode<'a>(
    ty: &TagType<'a>,
    words: &mut usize,
    bytes: &mut usize,
    empty_left: &mut u64,
    endianness: Endianness,
    level: usize,
) -> Result<Value<'a>> {
    if level >= DEFAULT_MAX_DEPTH {
        return Err(TagError::TooDeeplyNested {
            limit: DEFAULT_MAX_DEPTH,
            path: String::new(),
        });
    }
    let primary = word(ty, words)?;
    if let Some(atomic) = AtomicType::from_code(primary) {
        let b = take(ty.payload, bytes, atomic.size())?;
        return Ok(Value::Scalar(Scalar::decode(atomic, b, endianness)));
    }
    match primary {
        STRING => {
            let n = word(ty, words)?;
            let b = take(ty.payload, bytes, n.saturating_mul(2))?;
            Ok(Value::Text(decode_utf16(b, endianness)?))
        }
        ARRAY => {
            let (item_size, item_words) = size_at(ty, *words)?;
            let count = *ty
                .typespec
                .get(*words + item_words)
                .ok_or_else(TagError::invalid_tag)?;
            if let Some(atomic) = AtomicType::from_code(ty.typespec[*words]) {
                *words += item_words + 1;
                let data = take(ty.payload, bytes, count.saturating_mul(item_size))?;
                return Ok(Value::Array(ArrayValue {
                    element: atomic,
                    len: data.len() / atomic.size() as usize,
                    data,
                    endianness,
                }));
            }
            if item_size == 0 && count > *empty_left {
                return Err(TagError::invalid_tag());
            }
            let elem_start = *words;
            let cap = count.min(ty.payload.len() as u64) as usize;
            let mut items = Vec::with_capacity(cap);
            for _ in 0..count {
                *words = elem_start;
                let before = *bytes;
                items.push(decode(ty, words, bytes, empty_left, endianness, level + 1)?);
                // nested empty elements draw from the same allowance
                if *bytes == before {
                    *empty_left = empty_left.checked_sub(1).ok_or_else(TagError::invalid_tag)?;
                }
            }
            *words = elem_start + item_words + 1;
            Ok(Value::List(items))
        }
        STRUCT => {
            let name_length = word(ty, words)?;
            let nfields = word(ty, words)?;
            take(ty.payload, bytes, name_length)?;
            let mut fields = Vec::new();
            for _ in 0..nfields {
                let field_name_length = word(ty, words)?;
                take(ty.payload, bytes, field_name_length)?;
                fields.push(decode(ty, words, bytes, empty_left, endianness, level + 1)?);
            }
            Ok(Value::Struct(fields))
        }
        code => Err(TagError::InvalidOrUnsupportedType {
            code,
            path: String::new(),
        }),
    }
}

/// UTF-16 text in payload byte order; a leading byte-order mark is dropped.
pub fn decode_utf16(bytes: &[u8], endianness: Endianness) -> Result<String> {
    let units = bytes.chunks_exact(2).map(|c| match endianness {
        Endianness::Big => BigEndian::read_u16(c),
        Endianness::Little => LittleEndian::read_u16(c),
    });
    let mut out = String::with_capacity(bytes.len() / 2);
    for (i, ch) in char::decode_utf16(units).enumerate() {
        let ch = ch.map_err(|_| TagError::invalid_tag())?;
        if i == 0 && ch == '\u{feff}' {
            continue;
        }
        out.push(ch);
    }
    Ok(out)
}

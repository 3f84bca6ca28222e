// Recursive-descent reader for the DM3/DM4 tag tree.
use crate::cursor::ByteCursor;
use crate::error::{Result, TagError};
use crate::header::{ContainerHeader, Variant};
use crate::tree::{TagEntry, TagFile, TagGroup, TagNode, TagType, anonymous_label};
use crate::typespec::{self, DEFAULT_MAX_DEPTH};

/// Marker every tag type starts with.
pub const TAG_TYPE_MARKER: u32 = 0x2525_2525;
pub const KIND_GROUP: u8 = 20;
pub const KIND_LEAF: u8 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Ceiling for group nesting and typespec recursion.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Parse a complete DM3 or DM4 file held in memory.
pub fn parse(data: &[u8]) -> Result<TagFile<'_>> {
    parse_with(data, &ParseOptions::default())
}

pub fn parse_with<'a>(data: &'a [u8], opts: &ParseOptions) -> Result<TagFile<'a>> {
    let span = tracing::debug_span!(
        "parse_tags",
        len = data.len(),
        variant = tracing::field::Empty
    );
    let _enter = span.enter();
    let mut cursor = ByteCursor::new(data);
    let header = ContainerHeader::read(&mut cursor)?;
    span.record("variant", header.variant.version());
    let mut parser = Parser {
        cursor,
        variant: header.variant,
        max_depth: opts.max_depth,
        labels: vec![String::new()],
    };
    let root = parser.read_group(0)?;
    tracing::debug!(
        entries = root.len(),
        trailing = parser.cursor.remaining(),
        "parsed tag tree"
    );
    Ok(TagFile { header, root })
}

#[derive(Debug)]
struct Parser<'a> {
    cursor: ByteCursor<'a>,
    variant: Variant,
    max_depth: usize,
    /// Labels from the root down to the entry being read.
    labels: Vec<String>,
}

impl<'a> Parser<'a> {
    fn path(&self) -> String {
        self.labels.join("/")
    }

    fn read_group(&mut self, depth: usize) -> Result<TagGroup<'a>> {
        if depth >= self.max_depth {
            return Err(TagError::TooDeeplyNested {
                limit: self.max_depth,
                path: self.path(),
            });
        }
        let is_sorted = self.cursor.read_u8()? != 0;
        let is_open = self.cursor.read_u8()? != 0;
        let count = self.variant.read_word(&mut self.cursor)?;
        tracing::debug!(depth, count, is_sorted, is_open, "entering group");

        // Every entry needs at least kind + label length, so a lying count
        // cannot make us reserve more than the buffer could hold.
        let cap = count.min(self.cursor.remaining() as u64 / 3) as usize;
        let mut entries = Vec::with_capacity(cap);
        let mut index = 0usize;
        while (index as u64) < count {
            entries.push(self.read_entry(index, depth)?);
            index += 1;
        }
        tracing::debug!(depth, count, "leaving group");
        Ok(TagGroup {
            is_sorted,
            is_open,
            entries,
        })
    }

    fn read_entry(&mut self, index: usize, depth: usize) -> Result<TagEntry<'a>> {
        let at_offset = self.cursor.pos();
        let kind = self.cursor.read_u8()?;
        if kind != KIND_GROUP && kind != KIND_LEAF {
            return Err(TagError::NotGroupOrLeaf {
                code: kind,
                at_offset,
            });
        }
        let label_len = self.cursor.read_u16_be()?;
        let raw = self.cursor.take(u64::from(label_len))?;
        let anonymous = raw.is_empty();
        let label = if anonymous {
            anonymous_label(index)
        } else {
            decode_label(raw)
        };
        tracing::trace!(depth, %label, group = kind == KIND_GROUP, "entry");

        let data_size = match self.variant {
            Variant::Dm4 => Some(self.cursor.read_u64_be()?),
            Variant::Dm3 => None,
        };

        self.labels.push(label);
        let body_start = self.cursor.pos();
        let node = if kind == KIND_GROUP {
            TagNode::Group(self.read_group(depth + 1)?)
        } else {
            TagNode::Leaf(self.read_type()?)
        };
        if let Some(advisory) = data_size {
            let actual = (self.cursor.pos() - body_start) as u64;
            if advisory != actual {
                tracing::warn!(
                    path = %self.path(),
                    advisory,
                    actual,
                    "DM4 tag data size disagrees with parsed size"
                );
            }
        }
        let label = self.labels.pop().unwrap_or_default();

        Ok(TagEntry {
            label,
            anonymous,
            data_size,
            node,
        })
    }

    fn read_type(&mut self) -> Result<TagType<'a>> {
        let at_offset = self.cursor.pos();
        let marker = self.cursor.read_u32_be()?;
        if marker != TAG_TYPE_MARKER {
            return Err(TagError::BadMarker {
                at_offset,
                found: marker,
            });
        }
        let ntypes = self.variant.read_word(&mut self.cursor)?;
        let needed = ntypes.checked_mul(self.variant.word_size());
        if needed.is_none_or(|n| n > self.cursor.remaining() as u64) {
            return Err(TagError::Truncated {
                at_offset: self.cursor.pos(),
                needed: needed.unwrap_or(u64::MAX),
            });
        }
        let mut words = Vec::with_capacity(ntypes as usize);
        for _ in 0..ntypes {
            words.push(self.variant.read_word(&mut self.cursor)?);
        }
        let byte_size = typespec::resolve_exact(&words, self.max_depth)
            .map_err(|e| e.at_path(&self.path()))?;
        if self.variant == Variant::Dm3 && typespec::uses_quad(&words) {
            tracing::debug!(path = %self.path(), "64-bit integer type in a DM3 file");
        }
        tracing::debug!(
            typespec = %typespec::describe(&words),
            byte_size,
            "read typespec"
        );
        let payload = self.cursor.take(byte_size)?;
        Ok(TagType {
            typespec: words,
            byte_size,
            payload,
        })
    }
}

/// Labels are raw single-byte text; map each byte to the same code point.
fn decode_label(raw: &[u8]) -> String {
    raw.iter().map(|&b| char::from(b)).collect()
}

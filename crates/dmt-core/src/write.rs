use crate::error::{Result, TagError};
use crate::header::{ContainerHeader, Endianness, Variant};
use crate::reader::{KIND_GROUP, KIND_LEAF, TAG_TYPE_MARKER};
use crate::tree::{TagEntry, TagGroup, TagNode, TagType};

/// Serialize a tree as a complete DM3 or DM4 file.
///
/// Structural fields are written big-endian; payload bytes are copied as
/// they are, so they must already be in `endianness` order.
pub fn encode(root: &TagGroup<'_>, variant: Variant, endianness: Endianness) -> Result<Vec<u8>> {
    let mut w = Writer::new(variant);
    // placeholder header, patched once the size is known
    let mut header = ContainerHeader {
        variant,
        declared_size: 0,
        endianness,
    };
    header.write(&mut w.out)?;
    w.group(root)?;
    w.out
        .extend(std::iter::repeat_n(0u8, variant.trailer_len() as usize));

    let total = w.out.len() as u64;
    header.declared_size = total - variant.reported_size_offset();
    let mut patched = Vec::with_capacity(variant.header_len() as usize);
    header.write(&mut patched)?;
    w.out[..patched.len()].copy_from_slice(&patched);
    tracing::debug!(?variant, total, "encoded tag tree");
    Ok(w.out)
}

pub fn encode_file(
    path: &std::path::Path,
    root: &TagGroup<'_>,
    variant: Variant,
    endianness: Endianness,
) -> Result<()> {
    let data = encode(root, variant, endianness)?;
    std::fs::write(path, data)?;
    Ok(())
}

struct Writer {
    out: Vec<u8>,
    variant: Variant,
}

impl Writer {
    fn new(variant: Variant) -> Self {
        Self {
            out: Vec::with_capacity(1024),
            variant,
        }
    }
    fn push(&mut self, b: u8) {
        self.out.push(b);
    }
    fn write_u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }
    fn write_u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }
    fn write_word(&mut self, v: u64) -> Result<()> {
        self.variant.write_word(&mut self.out, v)
    }

    fn group(&mut self, group: &TagGroup<'_>) -> Result<()> {
        self.push(u8::from(group.is_sorted));
        self.push(u8::from(group.is_open));
        self.write_word(group.entries.len() as u64)?;
        for entry in &group.entries {
            self.entry(entry)?;
        }
        Ok(())
    }

    fn entry(&mut self, entry: &TagEntry<'_>) -> Result<()> {
        self.push(match entry.node {
            TagNode::Group(_) => KIND_GROUP,
            TagNode::Leaf(_) => KIND_LEAF,
        });
        let label = if entry.anonymous {
            Vec::new()
        } else {
            encode_label(&entry.label)?
        };
        let len = u16::try_from(label.len())
            .map_err(|_| TagError::unencodable(format!("label '{}' too long", entry.label)))?;
        self.write_u16(len);
        self.out.extend_from_slice(&label);

        // DM4 stores the body size up front; write a placeholder and patch it.
        let size_at = self.out.len();
        if self.variant == Variant::Dm4 {
            self.out.extend_from_slice(&[0u8; 8]);
        }
        let body_start = self.out.len();
        match &entry.node {
            TagNode::Group(g) => self.group(g)?,
            TagNode::Leaf(t) => self.leaf(t)?,
        }
        if self.variant == Variant::Dm4 {
            let body = (self.out.len() - body_start) as u64;
            self.out[size_at..size_at + 8].copy_from_slice(&body.to_be_bytes());
        }
        Ok(())
    }

    fn leaf(&mut self, ty: &TagType<'_>) -> Result<()> {
        if ty.byte_size != ty.payload.len() as u64 {
            return Err(TagError::unencodable(format!(
                "payload has {} bytes, typespec says {}",
                ty.payload.len(),
                ty.byte_size
            )));
        }
        self.write_u32(TAG_TYPE_MARKER);
        self.write_word(ty.typespec.len() as u64)?;
        for &w in &ty.typespec {
            self.write_word(w)?;
        }
        self.out.extend_from_slice(ty.payload);
        Ok(())
    }
}

fn encode_label(label: &str) -> Result<Vec<u8>> {
    label
        .chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                TagError::unencodable(format!("label '{label}' has a character above U+00FF"))
            })
        })
        .collect()
}

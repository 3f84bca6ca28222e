//! In-memory tag tree. Ownership is strictly top-down; leaf payloads borrow
//! from the file buffer, so a tree can never outlive the bytes it was read from.

use crate::error::{Result, TagError};
use crate::header::ContainerHeader;
use crate::index::PathIndex;
use crate::typespec::{self, DEFAULT_MAX_DEPTH};

/// Typed leaf payload: its typespec and the bytes it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagType<'a> {
    pub typespec: Vec<u64>,
    pub byte_size: u64,
    pub payload: &'a [u8],
}

impl<'a> TagType<'a> {
    /// Build a leaf, checking that `payload` is exactly what `typespec` describes.
    pub fn new(typespec: Vec<u64>, payload: &'a [u8]) -> Result<Self> {
        let byte_size = typespec::resolve_exact(&typespec, DEFAULT_MAX_DEPTH)?;
        if byte_size != payload.len() as u64 {
            return Err(TagError::unencodable(format!(
                "typespec {} describes {byte_size} bytes, payload has {}",
                typespec::describe(&typespec),
                payload.len()
            )));
        }
        Ok(Self {
            typespec,
            byte_size,
            payload,
        })
    }

    /// First typespec word, if the typespec is not empty.
    pub fn primary(&self) -> Option<u64> {
        self.typespec.first().copied()
    }

    /// True when the typespec has this length and matches every `Some` position.
    pub fn matches(&self, pattern: &[Option<u64>]) -> bool {
        self.typespec.len() == pattern.len()
            && self
                .typespec
                .iter()
                .zip(pattern)
                .all(|(w, p)| p.is_none_or(|p| p == *w))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagNode<'a> {
    Group(TagGroup<'a>),
    Leaf(TagType<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry<'a> {
    pub label: String,
    /// The file stored an empty label and `label` is the synthesized `#<index>`.
    pub anonymous: bool,
    /// DM4 advisory size of the entry body; `None` in DM3.
    pub data_size: Option<u64>,
    pub node: TagNode<'a>,
}

impl<'a> TagEntry<'a> {
    pub fn group(label: impl Into<String>, group: TagGroup<'a>) -> Self {
        Self {
            label: label.into(),
            anonymous: false,
            data_size: None,
            node: TagNode::Group(group),
        }
    }

    pub fn leaf(label: impl Into<String>, ty: TagType<'a>) -> Self {
        Self {
            label: label.into(),
            anonymous: false,
            data_size: None,
            node: TagNode::Leaf(ty),
        }
    }

    /// Entry written with an empty label; it reads back as `#<index>`.
    pub fn unnamed(index: usize, node: TagNode<'a>) -> Self {
        Self {
            label: anonymous_label(index),
            anonymous: true,
            data_size: None,
            node,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.node, TagNode::Group(_))
    }

    pub fn as_group(&self) -> Option<&TagGroup<'a>> {
        match &self.node {
            TagNode::Group(g) => Some(g),
            TagNode::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&TagType<'a>> {
        match &self.node {
            TagNode::Leaf(t) => Some(t),
            TagNode::Group(_) => None,
        }
    }
}

pub(crate) fn anonymous_label(index: usize) -> String {
    format!("#{index}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagGroup<'a> {
    pub is_sorted: bool,
    pub is_open: bool,
    pub entries: Vec<TagEntry<'a>>,
}

impl<'a> TagGroup<'a> {
    pub fn new(entries: Vec<TagEntry<'a>>) -> Self {
        Self {
            is_sorted: false,
            is_open: false,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with this label.
    pub fn child(&self, label: &str) -> Option<&TagEntry<'a>> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// Count leaves below this group.
    pub fn leaf_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match &e.node {
                TagNode::Group(g) => g.leaf_count(),
                TagNode::Leaf(_) => 1,
            })
            .sum()
    }
}

/// A parsed file: header plus the root group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFile<'a> {
    pub header: ContainerHeader,
    pub root: TagGroup<'a>,
}

impl<'a> TagFile<'a> {
    pub fn index(&self) -> PathIndex<'_, 'a> {
        PathIndex::build(&self.root, self.header.endianness)
    }
}

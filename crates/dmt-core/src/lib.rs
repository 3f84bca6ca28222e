//! dmt-core: reader for Digital Micrograph DM3/DM4 tag files
//!
//! The crate is organised around one zero-copy parse of the whole file:
//! - `reader` turns the bytes into a `TagFile` tree borrowing leaf payloads
//! - `index` flattens the tree into `/Group/Leaf` paths with typed getters
//! - `value` decodes payloads; `json` exports a tree for the CLI
//! - `write` serializes a tree back, mostly for building test files
//!
pub mod cursor;
pub mod detect;
pub mod error;
pub mod files;
pub mod header;
pub mod index;
pub mod json;
pub mod reader;
pub mod tree;
pub mod typespec;
pub mod value;
pub mod write;

pub use detect::{Detection, detect, detect_name_only};
pub use error::{Result, TagError};
pub use files::find_tag_files;
pub use header::{ContainerHeader, Endianness, Variant};
pub use index::PathIndex;
pub use json::{JsonOpts, dump_dir_json, dump_file_json, leaf_to_json, tree_to_json};
pub use reader::{ParseOptions, parse, parse_with};
pub use tree::{TagEntry, TagFile, TagGroup, TagNode, TagType};
pub use typespec::AtomicType;
pub use value::{ArrayValue, Scalar, Value};
pub use write::{encode, encode_file};

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::error::Result;
use crate::files::find_tag_files;
use crate::header::Endianness;
use crate::reader::parse;
use crate::tree::{TagFile, TagGroup, TagNode, TagType};
use crate::typespec::{ARRAY, USHORT};
use crate::value::{ArrayValue, Scalar, Value, decode_utf16};

#[derive(Debug, Clone, Copy)]
pub struct JsonOpts {
    pub max_array_elems: usize,
    /// Replace arrays over the limit with a `$type: array` summary.
    pub summarize_arrays: bool,
}

impl Default for JsonOpts {
    fn default() -> Self {
        Self {
            max_array_elems: 128,
            summarize_arrays: true,
        }
    }
}

pub fn tree_to_json(file: &TagFile<'_>, opts: JsonOpts) -> serde_json::Value {
    let endianness = file.header.endianness;
    let mut root = serde_json::Map::new();
    root.insert("$version".to_string(), json!(file.header.variant.version()));
    root.insert(
        "$byteOrder".to_string(),
        json!(match endianness {
            Endianness::Big => "big",
            Endianness::Little => "little",
        }),
    );
    root.insert("root".to_string(), group_json(&file.root, endianness, &opts));
    serde_json::Value::Object(root)
}

fn group_json(group: &TagGroup<'_>, endianness: Endianness, opts: &JsonOpts) -> serde_json::Value {
    let mut map = serde_json::Map::with_capacity(group.len());
    for (i, entry) in group.entries.iter().enumerate() {
        let v = match &entry.node {
            TagNode::Group(g) => group_json(g, endianness, opts),
            TagNode::Leaf(t) => leaf_to_json(t, endianness, opts),
        };
        // repeated labels keep every entry, suffixed with their position
        let key = if map.contains_key(&entry.label) {
            format!("{}#{i}", entry.label)
        } else {
            entry.label.clone()
        };
        map.insert(key, v);
    }
    serde_json::Value::Object(map)
}

/// Decoded value of one leaf, rendered the same way `tree_to_json` does.
pub fn leaf_to_json(ty: &TagType<'_>, endianness: Endianness, opts: &JsonOpts) -> serde_json::Value {
    // UTF-16 text is usually stored as a plain ushort array; so is 16-bit
    // image data, which must stay under the array limits
    if let [ARRAY, USHORT, n] = ty.typespec.as_slice()
        && *n <= opts.max_array_elems as u64
        && let Ok(s) = decode_utf16(ty.payload, endianness)
    {
        return json!(s);
    }
    match ty.value(endianness) {
        Ok(v) => value_json(&v, opts),
        Err(e) => json!({ "$error": e.to_string() }),
    }
}

fn scalar_json(s: Scalar) -> serde_json::Value {
    match s {
        Scalar::Short(v) => json!(v),
        Scalar::Long(v) => json!(v),
        Scalar::UShort(v) => json!(v),
        Scalar::ULong(v) => json!(v),
        Scalar::Float(v) => json!(v),
        Scalar::Double(v) => json!(v),
        Scalar::Bool(v) => json!(v),
        Scalar::Char(v) | Scalar::Octet(v) => json!(v),
        Scalar::Quad(v) => json!(v),
        Scalar::UQuad(v) => json!(v),
    }
}

fn value_json(v: &Value<'_>, opts: &JsonOpts) -> serde_json::Value {
    match v {
        Value::Scalar(s) => scalar_json(*s),
        Value::Text(s) => json!(s),
        Value::Array(arr) => array_json(arr, opts),
        Value::List(items) => {
            let max = opts.max_array_elems.min(items.len());
            let mut out: Vec<_> = items.iter().take(max).map(|it| value_json(it, opts)).collect();
            if items.len() > max {
                out.push(json!({"$truncated": true, "$omitted": items.len() - max}));
            }
            serde_json::Value::Array(out)
        }
        Value::Struct(fields) => {
            serde_json::Value::Array(fields.iter().map(|f| value_json(f, opts)).collect())
        }
    }
}

fn array_json(arr: &ArrayValue<'_>, opts: &JsonOpts) -> serde_json::Value {
    if arr.len > opts.max_array_elems && opts.summarize_arrays {
        return json!({"$type": "array", "element": arr.element.name(), "len": arr.len});
    }
    let max = opts.max_array_elems.min(arr.len);
    let mut out: Vec<_> = arr.iter().take(max).map(scalar_json).collect();
    if arr.len > max {
        out.push(json!({"$truncated": true, "$omitted": arr.len - max}));
    }
    serde_json::Value::Array(out)
}

pub fn dump_file_json(path: &Path, opts: JsonOpts) -> Result<serde_json::Value> {
    let data = fs::read(path)?;
    let file = parse(&data)?;
    Ok(tree_to_json(&file, opts))
}

/// File name to export for every tag file directly in `dir`.
pub fn dump_dir_json(dir: &Path, opts: JsonOpts) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for f in find_tag_files(dir, false) {
        let name = f
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let v = match dump_file_json(&f, opts) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(file = %f.display(), error = %e, "skipping unreadable tag file");
                json!({ "$error": e.to_string() })
            }
        };
        map.insert(name, v);
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{ContainerHeader, Variant};
    use crate::tree::TagEntry;
    use crate::typespec::{FLOAT, LONG, OCTET};

    fn file(root: TagGroup<'_>) -> TagFile<'_> {
        TagFile {
            header: ContainerHeader {
                variant: Variant::Dm4,
                declared_size: 0,
                endianness: Endianness::Little,
            },
            root,
        }
    }

    #[test]
    fn groups_become_ordered_objects() {
        let n = 5i32.to_le_bytes();
        let mut text = Vec::new();
        for c in "nm".encode_utf16() {
            text.extend_from_slice(&c.to_le_bytes());
        }
        let root = TagGroup::new(vec![
            TagEntry::leaf("Zeta", TagType::new(vec![LONG], &n).unwrap()),
            TagEntry::group(
                "Alpha",
                TagGroup::new(vec![TagEntry::leaf(
                    "Units",
                    TagType::new(vec![ARRAY, USHORT, 2], &text).unwrap(),
                )]),
            ),
        ]);
        let v = tree_to_json(&file(root), JsonOpts::default());
        assert_eq!(v["$version"], 4);
        assert_eq!(v["$byteOrder"], "little");
        assert_eq!(v["root"]["Zeta"], 5);
        assert_eq!(v["root"]["Alpha"]["Units"], "nm");
        let keys: Vec<_> = v["root"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["Zeta", "Alpha"]);
    }

    #[test]
    fn long_arrays_are_truncated_or_summarized() {
        let data: Vec<u8> = (0..10u32).flat_map(|i| (i as f32).to_le_bytes()).collect();
        let root = TagGroup::new(vec![TagEntry::leaf(
            "Data",
            TagType::new(vec![ARRAY, FLOAT, 10], &data).unwrap(),
        )]);
        let f = file(root);

        let v = tree_to_json(&f, JsonOpts { max_array_elems: 4, summarize_arrays: true });
        assert_eq!(v["root"]["Data"], json!({"$type": "array", "element": "float", "len": 10}));

        let v = tree_to_json(&f, JsonOpts { max_array_elems: 4, summarize_arrays: false });
        let arr = v["root"]["Data"].as_array().unwrap();
        assert_eq!(arr.len(), 5);
        assert_eq!(arr[3], 3.0);
        assert_eq!(arr[4], json!({"$truncated": true, "$omitted": 6}));
    }

    #[test]
    fn undecodable_leaf_reports_error() {
        let payload = [0u8, 0];
        let mut ty = TagType::new(vec![USHORT], &payload).unwrap();
        ty.typespec = vec![99];
        let root = TagGroup::new(vec![TagEntry::leaf("Bad", ty)]);
        let v = tree_to_json(&file(root), JsonOpts::default());
        assert!(v["root"]["Bad"]["$error"].is_string());
    }

    #[test]
    fn large_ushort_array_is_not_rendered_as_text() {
        let data = vec![0x41u8; 2 * 100_000];
        let root = TagGroup::new(vec![TagEntry::leaf(
            "Data",
            TagType::new(vec![ARRAY, USHORT, 100_000], &data).unwrap(),
        )]);
        let f = file(root);

        let v = tree_to_json(&f, JsonOpts::default());
        assert_eq!(
            v["root"]["Data"],
            json!({"$type": "array", "element": "ushort", "len": 100_000})
        );

        let v = tree_to_json(&f, JsonOpts { max_array_elems: 3, summarize_arrays: false });
        let arr = v["root"]["Data"].as_array().unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr[0], 0x4141);
        assert_eq!(arr[3], json!({"$truncated": true, "$omitted": 99_997}));
    }

    #[test]
    fn repeated_labels_are_all_exported() {
        let one = [1u8];
        let two = [2u8];
        let root = TagGroup::new(vec![
            TagEntry::leaf("X", TagType::new(vec![OCTET], &one).unwrap()),
            TagEntry::leaf("X", TagType::new(vec![OCTET], &two).unwrap()),
        ]);
        let v = tree_to_json(&file(root), JsonOpts::default());
        assert_eq!(v["root"]["X"], 1);
        assert_eq!(v["root"]["X#1"], 2);
    }
}

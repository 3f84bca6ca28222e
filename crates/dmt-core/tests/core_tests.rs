use dmt_core::typespec::{ARRAY, DOUBLE, LONG, STRING, USHORT};
use dmt_core::{
    Endianness, JsonOpts, ParseOptions, TagEntry, TagError, TagGroup, TagNode, TagType, Variant,
    encode, parse, parse_with,
};

/// Minimal DM3 file, little-endian payloads, one leaf `X` holding ushort 42.
fn minimal_dm3() -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&3u32.to_be_bytes());
    b.extend_from_slice(&24u32.to_be_bytes());
    b.extend_from_slice(&1u32.to_be_bytes());
    // root group: sorted, not open, one entry
    b.extend_from_slice(&[1, 0]);
    b.extend_from_slice(&1u32.to_be_bytes());
    b.extend_from_slice(&[21, 0, 1, b'X']);
    b.extend_from_slice(b"%%%%");
    b.extend_from_slice(&1u32.to_be_bytes());
    b.extend_from_slice(&4u32.to_be_bytes());
    b.extend_from_slice(&[0x2a, 0x00]);
    b.extend_from_slice(&[0, 0, 0, 0]);
    b
}

#[test]
fn minimal_dm3_reads_ushort() {
    let data = minimal_dm3();
    assert_eq!(data.len(), 40);
    let file = parse(&data).expect("parse");
    assert_eq!(file.header.variant, Variant::Dm3);
    assert_eq!(file.header.endianness, Endianness::Little);
    assert_eq!(file.header.declared_size, 24);
    assert_eq!(file.root.len(), 1);

    let index = file.index();
    assert_eq!(index.get_uint("/X"), Some(42));
    assert_eq!(index.get_uint("X"), Some(42));
    let leaf = index.get("/X").unwrap();
    assert_eq!(leaf.typespec, vec![USHORT]);
    assert_eq!(leaf.byte_size, 2);
}

#[test]
fn encoder_reproduces_hand_built_file() {
    let data = minimal_dm3();
    let file = parse(&data).unwrap();
    let again = encode(&file.root, Variant::Dm3, Endianness::Little).unwrap();
    assert_eq!(again, data);
}

#[test]
fn corrupt_marker_is_reported() {
    let mut data = minimal_dm3();
    data[22] = b'#';
    match parse(&data) {
        Err(TagError::BadMarker { at_offset, .. }) => assert_eq!(at_offset, 22),
        other => panic!("expected BadMarker, got {other:?}"),
    }
}

#[test]
fn unknown_entry_kind() {
    let mut data = minimal_dm3();
    data[18] = 7;
    assert!(matches!(
        parse(&data),
        Err(TagError::NotGroupOrLeaf { code: 7, at_offset: 18 })
    ));
}

#[test]
fn trailing_typespec_word_is_invalid() {
    let payload = [0x2a, 0x00];
    let mut leaf = TagType::new(vec![USHORT], &payload).unwrap();
    let root = TagGroup::new(vec![TagEntry::leaf("X", leaf.clone())]);
    let mut data = encode(&root, Variant::Dm3, Endianness::Little).unwrap();
    // splice an extra word after the atomic code and bump ntypes to 2
    data[29] = 2;
    data.splice(34..34, 7u32.to_be_bytes());
    let declared = (data.len() - 16) as u32;
    data[4..8].copy_from_slice(&declared.to_be_bytes());
    match parse(&data) {
        Err(TagError::InvalidTag { path }) => assert_eq!(path, "/X"),
        other => panic!("expected InvalidTag, got {other:?}"),
    }

    // the same typespec cannot be built in memory either
    leaf.typespec.push(7);
    assert!(TagType::new(leaf.typespec, &payload).is_err());
}

#[test]
fn unsupported_type_code_names_the_entry() {
    let data = minimal_dm3();
    let mut bad = data.clone();
    bad[33] = 13;
    match parse(&bad) {
        Err(TagError::InvalidOrUnsupportedType { code, path }) => {
            assert_eq!(code, 13);
            assert_eq!(path, "/X");
        }
        other => panic!("expected InvalidOrUnsupportedType, got {other:?}"),
    }
}

#[test]
fn dm4_advisory_size_is_ignored() {
    let payload = 42u16.to_le_bytes();
    let root = TagGroup::new(vec![TagEntry::leaf(
        "X",
        TagType::new(vec![USHORT], &payload).unwrap(),
    )]);
    let mut data = encode(&root, Variant::Dm4, Endianness::Little).unwrap();
    // header 16 + flags 2 + count 8 + kind 1 + label length 2 + label 1
    let at = 30;
    let written = u64::from_be_bytes(data[at..at + 8].try_into().unwrap());
    assert_eq!(written, 4 + 8 + 8 + 2);
    data[at..at + 8].copy_from_slice(&999u64.to_be_bytes());

    let file = parse(&data).unwrap();
    assert_eq!(file.header.variant, Variant::Dm4);
    assert_eq!(file.root.entries[0].data_size, Some(999));
    assert_eq!(file.index().get_uint("X"), Some(42));
}

#[test]
fn dm4_size_must_match_exactly() {
    let root = TagGroup::default();
    let mut data = encode(&root, Variant::Dm4, Endianness::Big).unwrap();
    assert!(parse(&data).is_ok());
    data.push(0);
    assert!(matches!(parse(&data), Err(TagError::SizeMismatch { .. })));
}

#[test]
fn empty_label_becomes_index() {
    let p = [1u8, 0];
    let leaf = || TagType::new(vec![USHORT], &p).unwrap();
    let root = TagGroup::new(vec![
        TagEntry::leaf("a", leaf()),
        TagEntry::leaf("b", leaf()),
        TagEntry::leaf("c", leaf()),
        TagEntry::unnamed(3, TagNode::Leaf(leaf())),
    ]);
    let data = encode(&root, Variant::Dm3, Endianness::Little).unwrap();
    let file = parse(&data).unwrap();
    let fourth = &file.root.entries[3];
    assert_eq!(fourth.label, "#3");
    assert!(fourth.anonymous);
    assert_eq!(file.index().get_uint("/#3"), Some(1));
}

#[test]
fn nested_groups_give_slash_paths() {
    let p = 7i32.to_be_bytes();
    let root = TagGroup::new(vec![TagEntry::group(
        "A",
        TagGroup::new(vec![TagEntry::leaf("B", TagType::new(vec![LONG], &p).unwrap())]),
    )]);
    let data = encode(&root, Variant::Dm3, Endianness::Big).unwrap();
    let file = parse(&data).unwrap();
    let index = file.index();
    let paths: Vec<_> = index.iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(paths, ["/A/B"]);
    assert_eq!(index.get_int("/A/B"), Some(7));
    assert!(file.root.child("A").unwrap().is_group());
}

#[test]
fn image_list_style_tree() {
    // ImageList/#0/ImageData/{Data, Dimensions/#0, Dimensions/#1} and a name
    let pixels: Vec<u8> = (0..6u16).flat_map(|v| v.to_le_bytes()).collect();
    let w = 3u32.to_le_bytes();
    let h = 2u32.to_le_bytes();
    let scale = 0.25f64.to_le_bytes();
    let name: Vec<u8> = "scan".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    let dims = TagGroup::new(vec![
        TagEntry::unnamed(0, TagNode::Leaf(TagType::new(vec![5], &w).unwrap())),
        TagEntry::unnamed(1, TagNode::Leaf(TagType::new(vec![5], &h).unwrap())),
    ]);
    let image = TagGroup::new(vec![
        TagEntry::group(
            "ImageData",
            TagGroup::new(vec![
                TagEntry::leaf("Data", TagType::new(vec![ARRAY, USHORT, 6], &pixels).unwrap()),
                TagEntry::group("Dimensions", dims),
                TagEntry::leaf("Scale", TagType::new(vec![DOUBLE], &scale).unwrap()),
            ]),
        ),
        TagEntry::leaf("Name", TagType::new(vec![STRING, 4], &name).unwrap()),
    ]);
    let root = TagGroup::new(vec![TagEntry::group(
        "ImageList",
        TagGroup::new(vec![TagEntry::unnamed(0, TagNode::Group(image))]),
    )]);

    for variant in [Variant::Dm3, Variant::Dm4] {
        let data = encode(&root, variant, Endianness::Little).unwrap();
        let file = parse(&data).unwrap();
        let index = file.index();
        assert_eq!(index.len(), 5);
        assert_eq!(index.get_uint("/ImageList/#0/ImageData/Dimensions/#0"), Some(3));
        assert_eq!(index.get_uint("/ImageList/#0/ImageData/Dimensions/#1"), Some(2));
        assert_eq!(index.get_float("/ImageList/#0/ImageData/Scale"), Some(0.25));
        assert_eq!(index.get_string("/ImageList/#0/Name").as_deref(), Some("scan"));
        let data_leaf = index
            .get_matching("/ImageList/#0/ImageData/Data", &[Some(ARRAY), None, None])
            .unwrap();
        let dmt_core::Value::Array(arr) = data_leaf.value(index.endianness()).unwrap() else {
            panic!("expected atomic array");
        };
        assert_eq!(arr.len, 6);
        assert_eq!(arr.get(5).map(|s| s.as_f64()), Some(5.0));
    }
}

#[test]
fn nesting_limit() {
    let mut root = TagGroup::default();
    for _ in 0..300 {
        root = TagGroup::new(vec![TagEntry::group("g", root)]);
    }
    let data = encode(&root, Variant::Dm3, Endianness::Big).unwrap();
    assert!(matches!(parse(&data), Err(TagError::TooDeeplyNested { limit: 256, .. })));

    let opts = ParseOptions { max_depth: 512 };
    let file = parse_with(&data, &opts).unwrap();
    assert_eq!(file.root.leaf_count(), 0);

    let opts = ParseOptions { max_depth: 4 };
    assert!(matches!(
        parse_with(&data, &opts),
        Err(TagError::TooDeeplyNested { limit: 4, .. })
    ));
}

#[test]
fn file_and_directory_json() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.dm3");
    std::fs::write(&good, minimal_dm3()).unwrap();
    let mut broken = minimal_dm3();
    broken.truncate(30);
    std::fs::write(dir.path().join("broken.DM3"), broken).unwrap();
    std::fs::write(dir.path().join("readme.txt"), b"not a tag file").unwrap();

    let v = dmt_core::dump_file_json(&good, JsonOpts::default()).unwrap();
    assert_eq!(v["$version"], 3);
    assert_eq!(v["root"]["X"], 42);

    let all = dmt_core::dump_dir_json(dir.path(), JsonOpts::default());
    let obj = all.as_object().unwrap();
    assert_eq!(obj.len(), 2);
    assert_eq!(obj["good.dm3"]["root"]["X"], 42);
    assert!(obj["broken.DM3"]["$error"].is_string());

    assert!(matches!(
        dmt_core::dump_file_json(&dir.path().join("missing.dm3"), JsonOpts::default()),
        Err(TagError::Io(_))
    ));
}

#[test]
fn detection_on_real_bytes() {
    let data = minimal_dm3();
    let d = dmt_core::detect("whatever.bin", &data, data.len() as u64).unwrap();
    assert_eq!(d.variant, Variant::Dm3);
    assert_eq!(d.score, 100);

    let dm4 = encode(&TagGroup::default(), Variant::Dm4, Endianness::Little).unwrap();
    // an empty root has no marker, so only the name can match
    assert_eq!(dmt_core::detect("a.dm4", &dm4, dm4.len() as u64).map(|d| d.score), Some(15));
    assert_eq!(dmt_core::detect("a.bin", &dm4, dm4.len() as u64), None);
}

#[test]
fn quad_is_read_from_dm3_files() {
    use dmt_core::typespec::QUAD;
    let v = (-5i64).to_le_bytes();
    let root = TagGroup::new(vec![TagEntry::leaf("Q", TagType::new(vec![QUAD], &v).unwrap())]);
    let data = encode(&root, Variant::Dm3, Endianness::Little).unwrap();
    let file = parse(&data).unwrap();
    assert_eq!(file.index().get_int("Q"), Some(-5));
}

#[test]
fn nested_empty_arrays_do_not_blow_up_export() {
    use dmt_core::typespec::OCTET;
    let ty = TagType::new(vec![ARRAY, ARRAY, ARRAY, OCTET, 0, 65536, 65536], &[]).unwrap();
    let root = TagGroup::new(vec![TagEntry::leaf("Empty", ty)]);
    let data = encode(&root, Variant::Dm3, Endianness::Little).unwrap();
    let file = parse(&data).unwrap();
    let v = dmt_core::tree_to_json(&file, JsonOpts::default());
    assert!(v["root"]["Empty"]["$error"].is_string());
}

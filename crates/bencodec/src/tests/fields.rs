use std::{sync::Arc, thread};

use crate::{Field, Record, RecordShape, cached_fields, from_bytes, type_fields};

fn resolved<T: Record>() -> Vec<(&'static str, Vec<usize>, bool)> {
    type_fields(RecordShape::of::<T>())
        .into_iter()
        .map(|f| (f.name, f.index, f.tagged))
        .collect()
}

#[derive(Debug, Default, Record)]
pub struct Left {
    pub x: i64,
    pub left: i64,
}

#[derive(Debug, Default, Record)]
pub struct Right {
    pub x: i64,
    pub right: i64,
}

#[derive(Debug, Default, Record)]
pub struct Ambiguous {
    #[bencode(flatten)]
    pub l: Left,
    #[bencode(flatten)]
    pub r: Right,
    pub y: i64,
}

#[test]
fn ambiguous_names_are_dropped() {
    assert_eq!(
        resolved::<Ambiguous>(),
        [
            ("left", vec![0, 1], false),
            ("right", vec![1, 1], false),
            ("y", vec![2], false),
        ]
    );

    let got: Ambiguous = from_bytes(b"d1:xi1e4:lefti2e5:righti3e1:yi4ee").unwrap();
    assert_eq!((got.l.x, got.r.x), (0, 0));
    assert_eq!((got.l.left, got.r.right, got.y), (2, 3, 4));
}

#[derive(Debug, Default, Record)]
pub struct TaggedLeft {
    #[bencode(rename = "x")]
    pub tagged: i64,
}

#[derive(Debug, Default, Record)]
pub struct TaggedWins {
    #[bencode(flatten)]
    pub r: Right,
    #[bencode(flatten)]
    pub t: TaggedLeft,
}

#[test]
fn tagged_field_wins_a_tie() {
    assert_eq!(
        resolved::<TaggedWins>(),
        [("right", vec![0, 1], false), ("x", vec![1, 0], true)]
    );
    let got: TaggedWins = from_bytes(b"d1:xi5ee").unwrap();
    assert_eq!((got.r.x, got.t.tagged), (0, 5));
}

#[derive(Debug, Default, Record)]
pub struct Shallow {
    #[bencode(flatten)]
    pub deep: Left,
    #[bencode(rename = "x")]
    pub top: i64,
}

#[test]
fn shallower_field_wins() {
    assert_eq!(
        resolved::<Shallow>(),
        [("left", vec![0, 1], false), ("x", vec![1], true)]
    );
}

#[derive(Debug, Default, Record)]
pub struct Twice {
    #[bencode(flatten)]
    pub first: Left,
    #[bencode(flatten)]
    pub second: Left,
    pub own: i64,
}

#[test]
fn type_embedded_twice_is_ambiguous() {
    assert_eq!(resolved::<Twice>(), [("own", vec![2], false)]);
}

#[derive(Debug, Default, Record)]
pub struct Node {
    pub value: i64,
    #[bencode(flatten)]
    pub next: Option<Box<Node>>,
}

#[test]
fn recursive_embedding_terminates() {
    assert_eq!(resolved::<Node>(), [("value", vec![0], false)]);
    let got: Node = from_bytes(b"d5:valuei1ee").unwrap();
    assert_eq!(got.value, 1);
    assert!(got.next.is_none());
}

#[derive(Debug, Default, Record)]
pub struct Names {
    #[bencode(rename = "a,b")]
    pub invalid: i64,
    #[bencode(rename = "piece length")]
    pub piece_length: u64,
    #[bencode(rename = "inner", flatten)]
    pub named: Left,
    pub r#type: String,
    private: i64,
    #[bencode(skip)]
    pub skipped: i64,
}

#[test]
fn names_and_visibility() {
    assert_eq!(
        resolved::<Names>(),
        [
            ("invalid", vec![0], false),
            ("piece length", vec![1], true),
            ("inner", vec![2], true),
            ("type", vec![3], false),
        ]
    );

    let got: Names =
        from_bytes(b"d12:piece lengthi16384e5:innerd1:xi3ee4:type4:file7:privatei1ee").unwrap();
    assert_eq!(got.piece_length, 16_384);
    assert_eq!(got.named.x, 3);
    assert_eq!(got.r#type, "file");
    assert_eq!(got.private, 0);
}

#[test]
fn field_carries_declared_metadata() {
    #[derive(Debug, Default, Record)]
    pub struct Meta {
        #[bencode(omit_empty)]
        pub list: Vec<Option<u32>>,
    }

    let fields: Arc<[Field]> = cached_fields::<Meta>();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].ty, "Vec<Option<u32>>");
    assert!(fields[0].omit_empty);
    assert!(!fields[0].quoted);
    assert_eq!(fields[0].name_bytes, b"list");
}

#[test]
fn cache_returns_one_table() {
    let a = cached_fields::<Ambiguous>();
    let b = cached_fields::<Ambiguous>();
    assert!(Arc::ptr_eq(&a, &b));
}

#[derive(Debug, Default, Record)]
pub struct Contended {
    #[bencode(flatten)]
    pub l: Left,
    #[bencode(flatten)]
    pub n: Names,
    pub z: i64,
}

#[test]
fn concurrent_resolution_is_consistent() {
    let expected = resolved::<Contended>();
    let tables: Vec<Arc<[Field]>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(cached_fields::<Contended>)).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for table in &tables {
        assert!(Arc::ptr_eq(table, &tables[0]));
        let got: Vec<_> = table
            .iter()
            .map(|f| (f.name, f.index.clone(), f.tagged))
            .collect();
        assert_eq!(got, expected);
    }
}

//! Field resolution for record destinations.
//!
//! A record declares its fields through a static table of [`DeclaredField`]s,
//! normally generated by `#[derive(Record)]`. [`type_fields`] flattens that
//! table breadth-first through embedded records into the set of names a
//! dictionary key may bind to. Conflicting names are settled by the
//! dominant-field rule: the shallowest field wins, ties go to the only tagged
//! one, and anything else is dropped.
//!
//! Resolution is pure and deterministic, so results are memoized per type in a
//! process-wide cache ([`cached_fields`]).

use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
    mem,
    sync::{Arc, LazyLock},
};

use bstr::ByteSlice;
use parking_lot::RwLock;

use crate::decode::Fields;

/// One field as written in a record declaration.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredField {
    /// Declared identifier.
    pub name: &'static str,
    /// Override name from `#[bencode(rename = "...")]`.
    pub tag: Option<&'static str>,
    /// Declared type, for error messages.
    pub ty: &'static str,
    /// Whether the field is visible outside its module.
    pub exported: bool,
    /// `#[bencode(skip)]`: never bound.
    pub skip: bool,
    /// `#[bencode(omit_empty)]`. Carried for encoders; decoding ignores it.
    pub omit_empty: bool,
    /// `#[bencode(string)]`: reserved quoted-string decoding.
    pub quoted: bool,
    /// Shape of the flattened record, for `#[bencode(flatten)]` fields.
    pub embedded: Option<fn() -> RecordShape>,
}

/// The static description of a record type.
#[derive(Debug, Clone, Copy)]
pub struct RecordShape {
    /// Identity of the record type.
    pub type_id: fn() -> TypeId,
    /// Name of the record type.
    pub name: &'static str,
    /// Declared fields in declaration order.
    pub fields: &'static [DeclaredField],
}

impl RecordShape {
    /// The shape of `T`.
    #[must_use]
    pub fn of<T: Record>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            name: T::NAME,
            fields: T::FIELDS,
        }
    }
}

/// A struct whose fields are bound from dictionary keys.
///
/// Implement with `#[derive(Record)]`.
pub trait Record: Fields + 'static {
    /// Type name used in error messages.
    const NAME: &'static str;
    /// Declared fields, indexed by [`Fields::field_mut`].
    const FIELDS: &'static [DeclaredField];
}

/// Types that can be flattened into an enclosing record.
pub trait Embed {
    /// Shape of the record reached through this type.
    fn shape() -> RecordShape;
}

impl<T: Embed> Embed for Option<T> {
    fn shape() -> RecordShape {
        T::shape()
    }
}

impl<T: Embed> Embed for Box<T> {
    fn shape() -> RecordShape {
        T::shape()
    }
}

/// A resolved, bindable field.
#[derive(Debug, Clone)]
pub struct Field {
    /// Effective name: the override if valid, otherwise the declared name.
    pub name: &'static str,
    /// Byte form of `name`, compared against dictionary keys.
    pub name_bytes: &'static [u8],
    /// Case-insensitive comparison chosen for `name`.
    pub equal_fold: fn(&[u8], &[u8]) -> bool,
    /// Whether `name` came from an override.
    pub tagged: bool,
    /// Path of declared-field indices from the root record.
    pub index: Vec<usize>,
    /// Declared type.
    pub ty: &'static str,
    /// See [`DeclaredField::omit_empty`].
    pub omit_empty: bool,
    /// See [`DeclaredField::quoted`].
    pub quoted: bool,
}

impl Field {
    fn new(name: &'static str, tagged: bool, index: Vec<usize>, decl: &DeclaredField) -> Self {
        Self {
            name,
            name_bytes: name.as_bytes(),
            equal_fold: fold_func(name.as_bytes()),
            tagged,
            index,
            ty: decl.ty,
            omit_empty: decl.omit_empty,
            quoted: decl.quoted,
        }
    }
}

/// Reports whether `tag` may be used as a field name override.
#[must_use]
pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| "!#$%&()*+-./:;<=>?@[]^_{|}~ ".contains(c) || c.is_alphanumeric())
}

/// Flattens `root` into its bindable fields, ordered by index path.
#[must_use]
pub fn type_fields(root: RecordShape) -> Vec<Field> {
    let mut next = vec![(root, Vec::new())];
    let mut next_count: HashMap<TypeId, usize> = HashMap::new();
    let mut visited = HashSet::new();
    let mut fields = Vec::new();

    while !next.is_empty() {
        let current = mem::take(&mut next);
        let count = mem::take(&mut next_count);

        for (shape, path) in current {
            let id = (shape.type_id)();
            if !visited.insert(id) {
                continue;
            }
            for (i, decl) in shape.fields.iter().enumerate() {
                if decl.skip || (decl.embedded.is_none() && !decl.exported) {
                    continue;
                }
                let tag = decl.tag.filter(|t| is_valid_tag(t));
                let mut index = path.clone();
                index.push(i);

                if let (None, Some(embedded)) = (tag, decl.embedded) {
                    let inner = embedded();
                    let seen = next_count.entry((inner.type_id)()).or_insert(0);
                    *seen += 1;
                    if *seen == 1 {
                        next.push((inner, index));
                    }
                    continue;
                }

                let field = Field::new(tag.unwrap_or(decl.name), tag.is_some(), index, decl);
                // Embedded twice at the parent level: a duplicate makes every
                // name from this type ambiguous.
                if count.get(&id).copied().unwrap_or(0) > 1 {
                    fields.push(field.clone());
                }
                fields.push(field);
            }
        }
    }

    fields.sort_by(|a, b| {
        a.name
            .cmp(b.name)
            .then(a.index.len().cmp(&b.index.len()))
            .then(b.tagged.cmp(&a.tagged))
            .then_with(|| a.index.cmp(&b.index))
    });

    let mut out: Vec<Field> = fields
        .chunk_by(|a, b| a.name == b.name)
        .filter_map(dominant_field)
        .cloned()
        .collect();
    out.sort_by(|a, b| a.index.cmp(&b.index));
    out
}

/// Picks the winner among fields sharing one name, sorted by depth then tag.
///
/// Returns `None` when the shallowest candidates tie.
#[must_use]
pub fn dominant_field(group: &[Field]) -> Option<&Field> {
    match group {
        [first, second, ..]
            if first.index.len() == second.index.len() && first.tagged == second.tagged =>
        {
            None
        }
        [first, ..] => Some(first),
        [] => None,
    }
}

static FIELD_CACHE: LazyLock<RwLock<HashMap<TypeId, Arc<[Field]>>>> =
    LazyLock::new(Default::default);

/// Resolved fields of `T`, computed once per type.
#[must_use]
pub fn cached_fields<T: Record>() -> Arc<[Field]> {
    cached_shape_fields(RecordShape::of::<T>())
}

pub(crate) fn cached_shape_fields(shape: RecordShape) -> Arc<[Field]> {
    let id = (shape.type_id)();
    if let Some(fields) = FIELD_CACHE.read().get(&id) {
        return Arc::clone(fields);
    }
    let fields: Arc<[Field]> = type_fields(shape).into();
    tracing::trace!(record = shape.name, fields = fields.len(), "resolved field table");
    Arc::clone(FIELD_CACHE.write().entry(id).or_insert(fields))
}

fn fold_func(name: &[u8]) -> fn(&[u8], &[u8]) -> bool {
    // 'k' and 's' have non-ASCII case variants (KELVIN SIGN, LONG S).
    let special = name
        .iter()
        .any(|&c| !c.is_ascii() || matches!(c, b'k' | b'K' | b's' | b'S'));
    if special {
        unicode_equal_fold
    } else {
        ascii_equal_fold
    }
}

fn ascii_equal_fold(name: &[u8], key: &[u8]) -> bool {
    name.eq_ignore_ascii_case(key)
}

fn unicode_equal_fold(name: &[u8], key: &[u8]) -> bool {
    let fold = |b: &[u8]| {
        b.chars()
            .flat_map(char::to_uppercase)
            .flat_map(char::to_lowercase)
            .collect::<String>()
    };
    fold(name) == fold(key)
}

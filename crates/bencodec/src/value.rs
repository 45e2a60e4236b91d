use std::collections::BTreeMap;

use bstr::{BStr, BString, ByteSlice};

use crate::decode::{Decode, DecodeState};

/// A dynamically typed Bencode value.
///
/// Accepts any well-formed input; integers outside `i64` are a type
/// mismatch.
///
/// ```rust
/// use bencodec::Value;
///
/// let v: Value = bencodec::from_bytes(b"d4:infod6:lengthi42eee").unwrap();
/// assert_eq!(v.get("info").and_then(|i| i.get("length")), Some(&Value::Integer(42)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Integer(i64),
    Bytes(BString),
    List(Vec<Value>),
    Dict(BTreeMap<BString, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Bytes(BString::default())
    }
}

impl Value {
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&BStr> {
        match self {
            Value::Bytes(b) => Some(b.as_bstr()),
            _ => None,
        }
    }

    /// The value as UTF-8 text, if it is a string holding valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| b.to_str().ok())
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_dict(&self) -> Option<&BTreeMap<BString, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up `key` if this is a dictionary.
    #[must_use]
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&Value> {
        self.as_dict()?.get(key.as_ref().as_bstr())
    }
}

impl Decode for Value {
    fn decode_dict(&mut self, d: &mut DecodeState<'_>) {
        let mut map = BTreeMap::new();
        d.enter_dict();
        while let Some(key) = d.next_key() {
            let mut elem = Value::default();
            d.value(Some(&mut elem));
            map.insert(BString::from(key), elem);
        }
        *self = Value::Dict(map);
    }

    fn decode_list(&mut self, d: &mut DecodeState<'_>) {
        let mut items = Vec::new();
        d.enter_list();
        while d.next_element() {
            let mut elem = Value::default();
            d.value(Some(&mut elem));
            items.push(elem);
        }
        *self = Value::List(items);
    }

    fn decode_integer(&mut self, digits: &[u8], d: &mut DecodeState<'_>) {
        match digits.to_str().ok().and_then(|s| s.parse().ok()) {
            Some(n) => *self = Value::Integer(n),
            None => d.mismatch(format!("number {}", digits.as_bstr()), "i64"),
        }
    }

    fn decode_string(&mut self, body: &[u8], _: &mut DecodeState<'_>) {
        *self = Value::Bytes(BString::from(body));
    }
}

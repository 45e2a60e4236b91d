use core::{any::type_name, hash::BuildHasher, hash::Hash, str::FromStr};
use std::collections::{BTreeMap, HashMap};

use bstr::{BString, ByteSlice};

use super::{Decode, DecodeState, Fields};

fn parse<T: FromStr>(digits: &[u8]) -> Option<T> {
    core::str::from_utf8(digits).ok()?.parse().ok()
}

fn number_mismatch<T>(digits: &[u8], d: &mut DecodeState<'_>) {
    d.mismatch(format!("number {}", digits.as_bstr()), type_name::<T>());
}

macro_rules! impl_decode_int {
    ($($ty:ty),* $(,)?) => {$(
        impl Decode for $ty {
            fn decode_integer(&mut self, digits: &[u8], d: &mut DecodeState<'_>) {
                match parse::<$ty>(digits) {
                    Some(n) => *self = n,
                    None => number_mismatch::<$ty>(digits, d),
                }
            }
        }
    )*};
}

impl_decode_int!(i8, i16, i32, i64, i128, isize, u16, u32, u64, u128, usize);

impl Decode for u8 {
    fn decode_integer(&mut self, digits: &[u8], d: &mut DecodeState<'_>) {
        match parse::<u8>(digits) {
            Some(n) => *self = n,
            None => number_mismatch::<u8>(digits, d),
        }
    }

    fn vec_from_bytes(bytes: &[u8]) -> Option<Vec<Self>> {
        Some(bytes.to_vec())
    }
}

impl Decode for f64 {
    fn decode_integer(&mut self, digits: &[u8], d: &mut DecodeState<'_>) {
        match parse::<f64>(digits) {
            Some(n) if n.is_finite() => *self = n,
            _ => number_mismatch::<f64>(digits, d),
        }
    }
}

impl Decode for f32 {
    fn decode_integer(&mut self, digits: &[u8], d: &mut DecodeState<'_>) {
        match parse::<f32>(digits) {
            Some(n) if n.is_finite() => *self = n,
            _ => number_mismatch::<f32>(digits, d),
        }
    }
}

impl Decode for String {
    fn decode_string(&mut self, body: &[u8], d: &mut DecodeState<'_>) {
        match core::str::from_utf8(body) {
            Ok(s) => {
                self.clear();
                self.push_str(s);
            }
            Err(_) => d.mismatch("non-UTF-8 string", type_name::<Self>()),
        }
    }
}

impl Decode for BString {
    fn decode_string(&mut self, body: &[u8], _: &mut DecodeState<'_>) {
        *self = BString::from(body);
    }
}

impl Decode for Box<[u8]> {
    fn decode_string(&mut self, body: &[u8], _: &mut DecodeState<'_>) {
        *self = body.into();
    }
}

impl<T: Decode + Default> Decode for Vec<T> {
    fn decode_list(&mut self, d: &mut DecodeState<'_>) {
        d.enter_list();
        let mut i = 0;
        while d.next_element() {
            if i == self.capacity() {
                let grown = (self.capacity() + self.capacity() / 2).max(4);
                self.reserve_exact(grown - self.len());
            }
            if i == self.len() {
                self.push(T::default());
            }
            d.value(Some(&mut self[i]));
            i += 1;
        }
        if i == 0 {
            *self = Vec::new();
        } else {
            self.truncate(i);
        }
    }

    fn decode_string(&mut self, body: &[u8], d: &mut DecodeState<'_>) {
        match T::vec_from_bytes(body) {
            Some(bytes) => *self = bytes,
            None => d.mismatch("string", type_name::<Self>()),
        }
    }
}

impl<T: Decode + Default, const N: usize> Decode for [T; N] {
    fn decode_list(&mut self, d: &mut DecodeState<'_>) {
        d.enter_list();
        let mut i = 0;
        while d.next_element() {
            match self.get_mut(i) {
                Some(slot) => d.value(Some(slot)),
                None => d.value(None),
            }
            i += 1;
        }
        for slot in self.iter_mut().skip(i) {
            *slot = T::default();
        }
    }
}

impl<T: Decode + Default> Decode for Option<T> {
    fn decode_dict(&mut self, d: &mut DecodeState<'_>) {
        self.get_or_insert_with(T::default).decode_dict(d);
    }

    fn decode_list(&mut self, d: &mut DecodeState<'_>) {
        self.get_or_insert_with(T::default).decode_list(d);
    }

    fn decode_integer(&mut self, digits: &[u8], d: &mut DecodeState<'_>) {
        self.get_or_insert_with(T::default).decode_integer(digits, d);
    }

    fn decode_string(&mut self, body: &[u8], d: &mut DecodeState<'_>) {
        self.get_or_insert_with(T::default).decode_string(body, d);
    }

    fn as_fields(&mut self) -> Option<&mut dyn Fields> {
        self.get_or_insert_with(T::default).as_fields()
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode_dict(&mut self, d: &mut DecodeState<'_>) {
        (**self).decode_dict(d);
    }

    fn decode_list(&mut self, d: &mut DecodeState<'_>) {
        (**self).decode_list(d);
    }

    fn decode_integer(&mut self, digits: &[u8], d: &mut DecodeState<'_>) {
        (**self).decode_integer(digits, d);
    }

    fn decode_string(&mut self, body: &[u8], d: &mut DecodeState<'_>) {
        (**self).decode_string(body, d);
    }

    fn as_fields(&mut self) -> Option<&mut dyn Fields> {
        (**self).as_fields()
    }
}

/// Types usable as map keys; built from a dictionary key's raw bytes.
pub trait MapKey: Sized {
    /// Converts `key`, or returns `None` if it is not representable.
    fn from_key(key: &[u8]) -> Option<Self>;
}

impl MapKey for String {
    fn from_key(key: &[u8]) -> Option<Self> {
        core::str::from_utf8(key).ok().map(str::to_owned)
    }
}

impl MapKey for Vec<u8> {
    fn from_key(key: &[u8]) -> Option<Self> {
        Some(key.to_vec())
    }
}

impl MapKey for BString {
    fn from_key(key: &[u8]) -> Option<Self> {
        Some(BString::from(key))
    }
}

fn decode_entries<K: MapKey, V: Decode + Default>(
    d: &mut DecodeState<'_>,
    mut insert: impl FnMut(K, V),
) {
    d.enter_dict();
    while let Some(key) = d.next_key() {
        let Some(k) = K::from_key(key) else {
            d.mismatch(format!("key {:?}", key.as_bstr()), type_name::<K>());
            d.value(None);
            continue;
        };
        let mut elem = V::default();
        d.value(Some(&mut elem));
        insert(k, elem);
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: MapKey + Eq + Hash,
    V: Decode + Default,
    S: BuildHasher,
{
    fn decode_dict(&mut self, d: &mut DecodeState<'_>) {
        decode_entries(d, |k, v| {
            self.insert(k, v);
        });
    }
}

impl<K: MapKey + Ord, V: Decode + Default> Decode for BTreeMap<K, V> {
    fn decode_dict(&mut self, d: &mut DecodeState<'_>) {
        decode_entries(d, |k, v| {
            self.insert(k, v);
        });
    }
}

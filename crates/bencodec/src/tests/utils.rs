use std::io;

use bstr::BString;
use quickcheck::{Arbitrary, Gen};

use crate::Value;

/// Renders `value` in canonical Bencode.
pub(crate) fn encode(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Integer(n) => out.extend_from_slice(format!("i{n}e").as_bytes()),
        Value::Bytes(b) => {
            out.extend_from_slice(format!("{}:", b.len()).as_bytes());
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(map) => {
            out.push(b'd');
            for (key, item) in map {
                encode(&Value::Bytes(key.clone()), out);
                encode(item, out);
            }
            out.push(b'e');
        }
    }
}

pub(crate) fn encoded(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode(value, &mut out);
    out
}

/// A reader that hands out its data in caller-chosen chunk sizes.
pub(crate) struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    splits: Vec<usize>,
    next: usize,
}

impl ChunkedReader {
    pub(crate) fn new(data: Vec<u8>, splits: Vec<usize>) -> Self {
        Self {
            data,
            pos: 0,
            splits,
            next: 0,
        }
    }

    pub(crate) fn bytewise(data: Vec<u8>) -> Self {
        Self::new(data, vec![1])
    }
}

impl io::Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let chunk = match self.splits.get(self.next % self.splits.len().max(1)) {
            Some(&s) => 1 + s % remaining,
            None => remaining,
        };
        self.next += 1;
        let n = chunk.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn arbitrary_value(g: &mut Gen, depth: usize) -> Value {
    let kinds = if depth == 0 { 2 } else { 4 };
    match u8::arbitrary(g) % kinds {
        0 => Value::Integer(i64::arbitrary(g)),
        1 => Value::Bytes(BString::from(Vec::<u8>::arbitrary(g))),
        2 => {
            let len = usize::arbitrary(g) % 4;
            Value::List((0..len).map(|_| arbitrary_value(g, depth - 1)).collect())
        }
        _ => {
            let len = usize::arbitrary(g) % 4;
            Value::Dict(
                (0..len)
                    .map(|_| {
                        let key = BString::from(String::arbitrary(g));
                        (key, arbitrary_value(g, depth - 1))
                    })
                    .collect(),
            )
        }
    }
}

impl Arbitrary for Value {
    fn arbitrary(g: &mut Gen) -> Self {
        arbitrary_value(g, 3)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match self {
            Value::Integer(n) => Box::new(n.shrink().map(Value::Integer)),
            Value::Bytes(b) => Box::new(b.to_vec().shrink().map(|b| Value::Bytes(b.into()))),
            Value::List(items) => Box::new(items.clone().into_iter()),
            Value::Dict(map) => Box::new(map.clone().into_values()),
        }
    }
}

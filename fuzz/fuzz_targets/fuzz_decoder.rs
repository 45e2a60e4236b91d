#![no_main]
use std::{cell::RefCell, io};

use arbitrary::Arbitrary;
use bencodec::{DecodeError, Decoder, Value};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

const HEADER: usize = 5; // 1 flag + 4-byte seed

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if size < HEADER || seed.is_multiple_of(10) {
        data[0] = with_rng(|rng| rng.next_u32() as u8);
        data[1..5].copy_from_slice(&with_rng(|rng| rng.next_u32().to_le_bytes()));

        let mut prefix = HEADER;
        while prefix < size.min(max_size) {
            let written = append_value(&mut data[prefix..], size, max_size - prefix);
            if written == 0 {
                break;
            }
            prefix += written;
        }
        prefix
    } else {
        fuzzer_mutate(data, size, max_size)
    }
}

/// Appends one well-formed encoded value, truncated to `limit` bytes.
fn append_value(data: &mut [u8], size: usize, limit: usize) -> usize {
    let value = loop {
        let s = with_rng(|rng| rng.random_range(size / 2..=size * 2).min(limit));
        let bytes: Vec<u8> = with_rng(|rng| (0..s).map(|_| rng.random::<u8>()).collect());
        if let Ok(value) = ArbitraryValue::arbitrary(&mut arbitrary::Unstructured::new(&bytes)) {
            break value;
        }
    };

    let mut encoded = Vec::new();
    encode(&value.0, &mut encoded);
    let len = encoded.len().min(limit);
    data[..len].copy_from_slice(&encoded[..len]);
    len
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

#[derive(Debug)]
struct ArbitraryValue(Value);

impl<'a> Arbitrary<'a> for ArbitraryValue {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let value = match u.choose_index(12)? {
            0..=2 => Value::Integer(u.arbitrary()?),
            3..=6 => Value::Bytes(u.arbitrary::<Vec<u8>>()?.into()),
            7..=9 => {
                let elems: Vec<ArbitraryValue> = u.arbitrary()?;
                Value::List(elems.into_iter().map(|v| v.0).collect())
            }
            _ => {
                let m: Vec<(Vec<u8>, ArbitraryValue)> = u.arbitrary()?;
                Value::Dict(m.into_iter().map(|(k, v)| (k.into(), v.0)).collect())
            }
        };
        Ok(ArbitraryValue(value))
    }
}

fn encode(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Integer(n) => out.extend_from_slice(format!("i{n}e").as_bytes()),
        Value::Bytes(b) => {
            out.extend_from_slice(format!("{}:", b.len()).as_bytes());
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            out.push(b'l');
            items.iter().for_each(|item| encode(item, out));
            out.push(b'e');
        }
        Value::Dict(map) => {
            out.push(b'd');
            for (k, v) in map {
                encode(&Value::Bytes(k.clone()), out);
                encode(v, out);
            }
            out.push(b'e');
        }
    }
}

/// Serves the input in pseudo-random chunk sizes derived from a seed.
struct SplitReader<'a> {
    data: &'a [u8],
    rng: SmallRng,
}

impl io::Read for SplitReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() || buf.is_empty() {
            return Ok(0);
        }
        let n = self.rng.random_range(1..=self.data.len().min(buf.len()));
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn decoder(data: &[u8]) {
    if data.len() < HEADER {
        return;
    }
    let flags = data[0];
    let split_seed = u64::from(u32::from_le_bytes([data[1], data[2], data[3], data[4]]));
    let data = &data[HEADER..];

    let valid = bencodec::valid(data);
    let one_shot = bencodec::from_bytes::<Value>(data);
    match &one_shot {
        Ok(_) => assert!(valid),
        Err(DecodeError::Syntax(_)) => assert!(!valid),
        Err(DecodeError::TypeMismatch(_) | DecodeError::DepthLimitExceeded { .. }) => {
            assert!(valid);
        }
        Err(other) => panic!("unexpected one-shot error: {other}"),
    }

    let mut stream = Decoder::new(SplitReader {
        data,
        rng: SmallRng::seed_from_u64(split_seed),
    });
    if flags & 1 != 0 {
        stream.disallow_unknown_fields();
    }
    let first = stream.decode::<Value>();
    match (&one_shot, &first) {
        (Ok(expected), Ok(Some(got))) => {
            assert_eq!(expected, got);
            // Valid input may hold further values back to back.
            while let Some(next) = stream.decode::<Value>().transpose() {
                match next {
                    Ok(_) => {}
                    Err(DecodeError::TypeMismatch(_) | DecodeError::DepthLimitExceeded { .. }) => {
                        break;
                    }
                    Err(err) => panic!("valid input failed to stream: {err}"),
                }
            }
        }
        (_, Ok(None)) => assert!(data.is_empty()),
        _ => {}
    }
}

fuzz_target!(|data: &[u8]| decoder(data));

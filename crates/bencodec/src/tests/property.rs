use quickcheck::{QuickCheck, TestResult};

use super::utils::{ChunkedReader, encoded};
use crate::{Decoder, Value, from_bytes, valid};

fn tests() -> u64 {
    if is_ci::cached() { 10_000 } else { 1_000 }
}

/// Property: every encoded value validates, and every strict prefix of it does
/// not.
#[test]
fn validation_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(value: Value, cut: usize) -> bool {
        let bytes = encoded(&value);
        let cut = cut % bytes.len();
        valid(&bytes) && valid(&bytes) && !valid(&bytes[..cut])
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Value, usize) -> bool);
}

/// Property: one-shot decoding into `Value` reproduces the encoded value.
#[test]
fn one_shot_roundtrip_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(value: Value) -> bool {
        from_bytes::<Value>(&encoded(&value)).is_ok_and(|got| got == value)
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Value) -> bool);
}

/// Property: a stream of back-to-back values decodes to the same values no
/// matter how the reader partitions it.
#[test]
fn chunked_stream_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(values: Vec<Value>, splits: Vec<usize>) -> TestResult {
        if values.is_empty() {
            return TestResult::discard();
        }
        let payload: Vec<u8> = values.iter().flat_map(encoded).collect();
        let decoder = Decoder::new(ChunkedReader::new(payload, splits));
        match decoder.into_values::<Value>().collect::<Result<Vec<_>, _>>() {
            Ok(got) => TestResult::from_bool(got == values),
            Err(err) => TestResult::error(err.to_string()),
        }
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Vec<Value>, Vec<usize>) -> TestResult);
}

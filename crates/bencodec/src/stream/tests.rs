use std::io;

use insta::assert_snapshot;
use quickcheck_macros::quickcheck;

use super::*;
use crate::{
    DecodeError, Record, SyntaxError, SyntaxErrorKind, Value, tests::utils::ChunkedReader,
};

#[derive(Debug, Default, PartialEq, Record)]
pub struct Peer {
    pub ip: String,
    pub port: u16,
}

#[test]
fn back_to_back_values() {
    let input = b"d2:ip9:127.0.0.14:porti6881eed2:ip3:::14:porti80ee".to_vec();
    let mut decoder = Decoder::new(&input[..]);

    assert_eq!(
        decoder.decode::<Peer>().unwrap(),
        Some(Peer { ip: "127.0.0.1".into(), port: 6881 })
    );
    assert_eq!(decoder.offset(), 29);
    assert_eq!(
        decoder.decode::<Peer>().unwrap(),
        Some(Peer { ip: "::1".into(), port: 80 })
    );
    assert_eq!(decoder.offset(), input.len() as u64);
    assert_eq!(decoder.decode::<Peer>().unwrap(), None);
    assert_eq!(decoder.decode::<Peer>().unwrap(), None);
}

#[test]
fn byte_at_a_time_matches_whole_input() {
    let input = b"li1ei2ei3ee3:abcd1:kl0:ee".to_vec();
    let whole: Vec<Value> = Decoder::new(&input[..])
        .into_values()
        .collect::<Result<_, _>>()
        .unwrap();
    let bytewise: Vec<Value> = Decoder::new(ChunkedReader::bytewise(input))
        .into_values()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(whole.len(), 3);
    assert_eq!(whole, bytewise);
}

#[test]
fn skipping_values() {
    let mut decoder = Decoder::new(&b"d1:ai1ee3:xyzi7e"[..]);
    assert!(decoder.decode_into(None).unwrap());
    assert!(decoder.decode_into(None).unwrap());
    assert_eq!(decoder.decode::<i64>().unwrap(), Some(7));
    assert!(!decoder.decode_into(None).unwrap());
}

#[test]
fn end_of_input_mid_value() {
    let mut decoder = Decoder::new(ChunkedReader::bytewise(b"i1eli2e".to_vec()));
    assert_eq!(decoder.decode::<i64>().unwrap(), Some(1));
    let err = decoder.decode::<Vec<i64>>().unwrap_err();
    assert!(matches!(
        &err,
        DecodeError::Syntax(SyntaxError { kind: SyntaxErrorKind::UnexpectedEnd, offset: 7 })
    ));
    assert_snapshot!(err, @"bencode: unexpected end of Bencode input at offset 7");
}

#[test]
fn syntax_error_offsets_are_absolute() {
    let mut decoder = Decoder::new(&b"i1ei2ei03e"[..]);
    assert_eq!(decoder.decode::<i64>().unwrap(), Some(1));
    assert_eq!(decoder.decode::<i64>().unwrap(), Some(2));
    let err = decoder.decode::<i64>().unwrap_err();
    assert_eq!(err.offset(), Some(9));
    assert_snapshot!(err, @"bencode: invalid character '3' leading zeroes not allowed at offset 9");
}

#[test]
fn errors_poison_the_decoder() {
    let mut decoder = Decoder::new(&b"3:abci5e"[..]);
    let err = decoder.decode::<i64>().unwrap_err();
    assert!(matches!(&err, DecodeError::TypeMismatch(m) if m.offset == 0));

    // The mismatched value was consumed, but the decoder stays failed.
    assert_eq!(decoder.offset(), 5);
    let again = decoder.decode::<i64>().unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
}

#[test]
fn mismatch_offsets_are_absolute() {
    let mut decoder = Decoder::new(&b"i1eli1e3:abce"[..]);
    assert!(decoder.decode_into(None).unwrap());
    let mut got: Vec<i64> = Vec::new();
    let err = decoder.decode_into(Some(&mut got)).unwrap_err();
    assert_eq!(err.offset(), Some(7));
}

struct FailingReader {
    interrupted: bool,
}

impl io::Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.interrupted {
            self.interrupted = true;
            return Err(io::ErrorKind::Interrupted.into());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        Err(io::Error::other("disk on fire"))
    }
}

#[test]
fn read_errors_are_reported() {
    let mut decoder = Decoder::new(FailingReader { interrupted: false });
    let err = decoder.decode::<Value>().unwrap_err();
    assert!(matches!(&err, DecodeError::Io(e) if e.kind() == io::ErrorKind::Other));
    assert_snapshot!(err, @"bencode: read failed: disk on fire");
    assert!(matches!(decoder.decode::<Value>(), Err(DecodeError::Io(_))));
}

/// Serves one byte per read and marks the rest of each window, counting the
/// windows that arrive zeroed.
struct MarkingReader {
    data: Vec<u8>,
    pos: usize,
    zeroed_windows: usize,
}

impl io::Read for MarkingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(&b) = self.data.get(self.pos) else {
            return Ok(0);
        };
        if buf[0] == 0 {
            self.zeroed_windows += 1;
        }
        buf.fill(0xaa);
        buf[0] = b;
        self.pos += 1;
        Ok(1)
    }
}

#[test]
fn read_window_is_not_rezeroed() {
    let reader = MarkingReader {
        data: b"i1e".repeat(1000),
        pos: 0,
        zeroed_windows: 0,
    };
    let mut decoder = Decoder::new(reader);
    for _ in 0..1000 {
        assert_eq!(decoder.decode::<i64>().unwrap(), Some(1));
    }
    assert_eq!(decoder.decode::<i64>().unwrap(), None);
    assert_eq!(decoder.offset(), 3000);
    assert_eq!(decoder.into_inner().zeroed_windows, 1);
}

#[test]
fn buffered_holds_read_ahead() {
    let mut decoder = Decoder::new(&b"i1ei2e"[..]);
    assert_eq!(decoder.decode::<i64>().unwrap(), Some(1));
    assert_eq!(decoder.buffered(), b"i2e");
}

#[test]
fn unknown_fields_in_stream() {
    let mut decoder = Decoder::new(&b"d2:ip0:4:porti1e1:xi0ee"[..]);
    decoder.disallow_unknown_fields();
    let err = decoder.decode::<Peer>().unwrap_err();
    assert!(matches!(err, DecodeError::UnknownField(_)));
}

#[test]
fn large_string_spans_refills() {
    let body = vec![b'z'; 5_000];
    let mut input = format!("{}:", body.len()).into_bytes();
    input.extend_from_slice(&body);
    input.extend_from_slice(b"i1e");

    let mut decoder = Decoder::new(ChunkedReader::new(input, vec![700]));
    assert_eq!(decoder.decode::<Vec<u8>>().unwrap(), Some(body));
    assert_eq!(decoder.decode::<i64>().unwrap(), Some(1));
}

#[quickcheck]
fn integers_stream_in_any_chunking(values: Vec<i64>, splits: Vec<usize>) -> bool {
    let payload: Vec<u8> = values.iter().flat_map(|n| format!("i{n}e").into_bytes()).collect();
    let decoder = Decoder::new(ChunkedReader::new(payload, splits));
    decoder
        .into_values::<i64>()
        .collect::<Result<Vec<_>, _>>()
        .is_ok_and(|got| got == values)
}

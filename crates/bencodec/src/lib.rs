//! A streaming, non-recursive Bencode decoder.
//!
//! Bencode is the serialization format of the `BitTorrent` protocol: integers
//! (`i42e`), length-prefixed byte strings (`4:spam`), lists (`l...e`) and
//! dictionaries (`d...e`).
//!
//! - [`Scanner`] validates and tokenizes input one byte at a time with an
//!   explicit frame stack, so nesting depth never touches the call stack.
//! - [`unmarshal`] and [`from_bytes`] validate a complete buffer, then bind it
//!   into any [`Decode`] destination: integers, strings, byte vectors,
//!   sequences, maps, [`Value`], or structs deriving [`Record`].
//! - [`Decoder`] pulls successive values out of any [`std::io::Read`].
//!
//! ```rust
//! use bencodec::Record;
//!
//! #[derive(Debug, Default, Record)]
//! pub struct Torrent {
//!     pub announce: String,
//!     #[bencode(rename = "created by")]
//!     pub created_by: Option<String>,
//!     pub pieces: Vec<u8>,
//! }
//!
//! let t: Torrent =
//!     bencodec::from_bytes(b"d8:announce3:udp10:created by4:test6:pieces2:\x01\x02e").unwrap();
//! assert_eq!(t.announce, "udp");
//! assert_eq!(t.created_by.as_deref(), Some("test"));
//! assert_eq!(t.pieces, [1, 2]);
//! ```

#![allow(missing_docs)]

extern crate self as bencodec;

mod decode;
mod error;
mod fields;
mod options;
mod scanner;
mod stream;
mod value;

#[cfg(test)]
mod tests;

pub use decode::{Decode, DecodeState, Fields, MapKey};
pub use error::{DecodeError, QuotedByte, SyntaxError, SyntaxErrorKind, TypeMismatch};
pub use fields::{
    DeclaredField, Embed, Field, Record, RecordShape, cached_fields, dominant_field,
    is_valid_tag, type_fields,
};
pub use options::{DEFAULT_MAX_DEPTH, DecoderOptions};
pub use scanner::{Frame, Opcode, Scanner, check_valid, valid};
pub use stream::{Decoder, Values};
pub use value::Value;

#[cfg(feature = "derive")]
pub use bencodec_derive::Record;

/// Decodes the single value in `data` into `dest`.
///
/// The whole input is validated before anything is bound, so a syntax error
/// always wins over a type mismatch. A type mismatch does not stop decoding:
/// the remaining fields are still bound and the first mismatch is returned.
///
/// # Errors
///
/// [`DecodeError::InvalidDestination`] when `dest` is `None`; otherwise any
/// syntax or binding error.
pub fn unmarshal(data: &[u8], dest: Option<&mut dyn Decode>) -> Result<(), DecodeError> {
    unmarshal_with_options(data, dest, DecoderOptions::default())
}

/// [`unmarshal`] with explicit [`DecoderOptions`].
///
/// # Errors
///
/// As [`unmarshal`].
pub fn unmarshal_with_options(
    data: &[u8],
    dest: Option<&mut dyn Decode>,
    options: DecoderOptions,
) -> Result<(), DecodeError> {
    let Some(dest) = dest else {
        return Err(DecodeError::InvalidDestination);
    };
    check_valid(data, &mut Scanner::new())?;
    decode::DecodeState::new(data, options).unmarshal(Some(dest))
}

/// Decodes the single value in `data` into a fresh `T`.
///
/// # Errors
///
/// As [`unmarshal`].
pub fn from_bytes<T: Decode + Default>(data: &[u8]) -> Result<T, DecodeError> {
    let mut value = T::default();
    unmarshal(data, Some(&mut value))?;
    Ok(value)
}

//! Incremental decoding of back-to-back values from a reader.

use std::{io, marker::PhantomData};

use crate::{
    decode::{Decode, DecodeState},
    error::DecodeError,
    options::DecoderOptions,
    scanner::{Opcode, Scanner, latched},
};

const MIN_READ: usize = 512;

/// Reads and decodes a sequence of Bencode values from a reader.
///
/// Values may follow each other with no separator. Bytes are pulled from the
/// reader only as far as needed to complete the current value.
///
/// The first error of any kind is latched: every later call returns it again.
///
/// ```rust
/// use bencodec::Decoder;
///
/// let mut decoder = Decoder::new(&b"i1ei2e3:abc"[..]);
/// assert_eq!(decoder.decode::<i64>().unwrap(), Some(1));
/// assert_eq!(decoder.decode::<i64>().unwrap(), Some(2));
/// assert_eq!(decoder.decode::<String>().unwrap().as_deref(), Some("abc"));
/// assert_eq!(decoder.decode::<i64>().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct Decoder<R> {
    reader: R,
    /// Read bytes live in `buf[..end]`; the rest is zeroed space for reads.
    buf: Vec<u8>,
    end: usize,
    scanp: usize,
    scanned: u64,
    scan: Scanner,
    err: Option<DecodeError>,
    options: DecoderOptions,
}

impl<R: io::Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecoderOptions::default())
    }

    pub fn with_options(reader: R, options: DecoderOptions) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            end: 0,
            scanp: 0,
            scanned: 0,
            scan: Scanner::new(),
            err: None,
            options,
        }
    }

    /// Turns on [`DecoderOptions::disallow_unknown_fields`].
    pub fn disallow_unknown_fields(&mut self) {
        self.options.disallow_unknown_fields = true;
    }

    /// Decodes the next value into `dest`, or discards it when `dest` is `None`.
    ///
    /// Returns `Ok(false)` when the reader ended cleanly between values.
    ///
    /// # Errors
    ///
    /// Syntax errors (including input ending mid-value), read failures and
    /// binding errors. Any error poisons the decoder.
    pub fn decode_into(&mut self, dest: Option<&mut dyn Decode>) -> Result<bool, DecodeError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        self.next_value(dest).inspect_err(|err| {
            tracing::debug!(offset = self.offset(), error = %err, "decoder poisoned");
            self.err = Some(err.clone());
        })
    }

    /// Decodes the next value as a fresh `T`; `None` at a clean end of input.
    ///
    /// # Errors
    ///
    /// As [`decode_into`](Self::decode_into).
    pub fn decode<T: Decode + Default>(&mut self) -> Result<Option<T>, DecodeError> {
        let mut value = T::default();
        Ok(self.decode_into(Some(&mut value))?.then_some(value))
    }

    /// An iterator decoding every remaining value as `T`.
    ///
    /// The iterator ends after the first error.
    pub fn into_values<T: Decode + Default>(self) -> Values<R, T> {
        Values {
            decoder: self,
            done: false,
            marker: PhantomData,
        }
    }

    /// Absolute input offset of the next undecoded byte.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.scanned + self.scanp as u64
    }

    /// Bytes read from the reader but not yet decoded.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.scanp..self.end]
    }

    /// The underlying reader. Bytes in [`buffered`](Self::buffered) are lost.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn next_value(&mut self, dest: Option<&mut dyn Decode>) -> Result<bool, DecodeError> {
        let Some(n) = self.read_value()? else {
            return Ok(false);
        };
        let result = {
            let span = &self.buf[self.scanp..self.scanp + n];
            DecodeState::new(span, self.options)
                .with_base(self.offset())
                .unmarshal(dest)
        };
        self.scanp += n;
        self.compact();
        result.map(|()| true)
    }

    /// Scans one complete value ahead of `scanp`, reading as needed, and
    /// returns its length. `None` means the reader ended before any byte.
    fn read_value(&mut self) -> Result<Option<usize>, DecodeError> {
        self.scan.reset();
        let mut scanned = 0;
        loop {
            for &c in &self.buf[self.scanp + scanned..self.end] {
                scanned += 1;
                if self.scan.step(c) == Opcode::Error {
                    return Err(self.syntax_error());
                }
                if self.scan.is_complete() {
                    return Ok(Some(scanned));
                }
            }
            if self.refill()? == 0 {
                if scanned == 0 {
                    return Ok(None);
                }
                self.scan.eof();
                return Err(self.syntax_error());
            }
        }
    }

    fn syntax_error(&self) -> DecodeError {
        latched(&self.scan).rebase(self.offset()).into()
    }

    fn compact(&mut self) {
        if self.scanp > 0 {
            self.scanned += self.scanp as u64;
            self.buf.copy_within(self.scanp..self.end, 0);
            self.end -= self.scanp;
            self.scanp = 0;
        }
    }

    fn refill(&mut self) -> Result<usize, DecodeError> {
        self.compact();
        // Only newly grown space is zeroed; the tail is reused across reads.
        if self.buf.len() - self.end < MIN_READ {
            self.buf.resize(2 * self.buf.len() + MIN_READ, 0);
        }

        let n = loop {
            match self.reader.read(&mut self.buf[self.end..]) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                other => break other?,
            }
        };
        self.end += n;
        tracing::trace!(
            read = n,
            buffered = self.end,
            capacity = self.buf.len(),
            "refilled decoder buffer"
        );
        Ok(n)
    }
}

/// Iterator returned by [`Decoder::into_values`].
#[derive(Debug)]
pub struct Values<R, T> {
    decoder: Decoder<R>,
    done: bool,
    marker: PhantomData<fn() -> T>,
}

impl<R: io::Read, T: Decode + Default> Iterator for Values<R, T> {
    type Item = Result<T, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.decode::<T>() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests;

//! Byte-at-a-time Bencode scanner.
//!
//! Overview
//! - [`Scanner::step`] consumes exactly one byte and classifies it with an
//!   [`Opcode`]. The scanner knows nothing about destination types; it only
//!   enforces the grammar and reports where tokens begin and end.
//! - Nesting is tracked with an explicit stack of [`Frame`]s rather than
//!   recursion, so adversarially deep input costs heap, not call stack.
//! - The current `Step` is the program counter of the state machine. Every
//!   byte is dispatched on it; transitions replace it.
//!
//! Errors
//! - The first illegal byte latches a [`SyntaxError`]. From then on every byte
//!   yields [`Opcode::Error`] and there is no recovery short of
//!   [`Scanner::reset`].
//!
//! Example
//! ```rust
//! use bencodec::{Opcode, Scanner};
//!
//! let mut scanner = Scanner::new();
//! let ops: Vec<Opcode> = b"i7e".iter().map(|&b| scanner.step(b)).collect();
//! assert_eq!(
//!     ops,
//!     [Opcode::BeginInteger, Opcode::IntegerDigits, Opcode::EndInteger]
//! );
//! assert_eq!(scanner.eof(), Opcode::End);
//! ```

use crate::error::{QuotedByte, SyntaxError, SyntaxErrorKind};

/// Classification of one consumed byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// The byte continues the current token.
    Continue,
    /// `d` opened a dictionary.
    BeginDict,
    /// `e` closed a dictionary.
    EndDict,
    /// `l` opened a list.
    BeginList,
    /// `e` closed a list.
    EndList,
    /// `i` opened an integer.
    BeginInteger,
    /// First byte of an integer's digit run (possibly `-`).
    IntegerDigits,
    /// `e` closed an integer.
    EndInteger,
    /// First digit of a string length prefix.
    BeginString,
    /// First body byte of a string, or the `:` of an empty string.
    StringBody,
    /// A complete top-level value has been seen.
    End,
    /// The input is invalid; see [`Scanner::error`].
    Error,
}

/// One entry of the scanner's open-construct stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frame {
    /// Inside a dictionary, expecting a key or `e`.
    DictKey,
    /// Inside a dictionary, expecting the value for the key just read.
    DictValue,
    /// Inside a list, expecting a value or `e`.
    ListValue,
    /// Inside `i...e`.
    Integer,
    /// Reading the decimal length of a string.
    StringLength,
    /// Reading the body of a string.
    StringBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Value,
    DictKeyOrEnd,
    ListValueOrEnd,
    AfterValue,
    IntegerStart,
    IntegerNegative,
    IntegerZero,
    IntegerMagnitude,
    LengthZero,
    LengthDigits,
    BodyFirst,
    Body,
    EndTop,
    Error,
}

pub(crate) const PHASE_PANIC_MSG: &str = "Bencode decoder out of sync - data changing underfoot?";

/// Grammar-enforcing state machine over a Bencode byte stream.
#[derive(Debug, Clone)]
pub struct Scanner {
    step: Step,
    frames: Vec<Frame>,
    end_top: bool,
    err: Option<SyntaxError>,
    bytes: u64,
    length: usize,
    remaining: usize,
    last_len: usize,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    /// Creates a scanner expecting the start of a value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            step: Step::Value,
            frames: Vec::with_capacity(16),
            end_top: false,
            err: None,
            bytes: 0,
            length: 0,
            remaining: 0,
            last_len: 0,
        }
    }

    /// Returns the scanner to its initial state, keeping allocations.
    ///
    /// The byte counter restarts at zero, so error offsets are relative to the
    /// most recent reset.
    pub fn reset(&mut self) {
        self.step = Step::Value;
        self.frames.clear();
        self.end_top = false;
        self.err = None;
        self.bytes = 0;
        self.length = 0;
        self.remaining = 0;
        self.last_len = 0;
    }

    /// Consumes one byte.
    pub fn step(&mut self, c: u8) -> Opcode {
        self.bytes += 1;
        match self.step {
            Step::Value => self.value(c),
            Step::DictKeyOrEnd => self.dict_key_or_end(c),
            Step::ListValueOrEnd => self.list_value_or_end(c),
            Step::AfterValue => self.after_value(c),
            Step::IntegerStart => self.integer_start(c),
            Step::IntegerNegative => self.integer_negative(c),
            Step::IntegerZero => self.integer_zero(c),
            Step::IntegerMagnitude => self.integer_magnitude(c),
            Step::LengthZero => self.length_zero(c),
            Step::LengthDigits => self.length_digits(c),
            Step::BodyFirst => self.body_first(),
            Step::Body => self.body(),
            Step::EndTop => {
                // Another value follows back to back.
                self.end_top = false;
                self.value(c)
            }
            Step::Error => Opcode::Error,
        }
    }

    /// Signals that no more bytes remain.
    ///
    /// Returns [`Opcode::End`] if a complete top-level value was scanned and no
    /// error is latched; otherwise latches "unexpected end of Bencode input".
    pub fn eof(&mut self) -> Opcode {
        if self.err.is_some() {
            return Opcode::Error;
        }
        if self.end_top {
            return Opcode::End;
        }
        self.step = Step::Error;
        self.err = Some(SyntaxError {
            kind: SyntaxErrorKind::UnexpectedEnd,
            offset: self.bytes,
        });
        Opcode::Error
    }

    /// The latched syntax error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&SyntaxError> {
        self.err.as_ref()
    }

    /// Number of open frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The open frames, outermost first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Whether a complete top-level value has been scanned.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.end_top
    }

    /// Bytes consumed since the last reset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.bytes
    }

    /// Declared length of the most recent string whose `:` was scanned.
    #[must_use]
    pub fn string_len(&self) -> usize {
        self.last_len
    }

    fn fail(&mut self, c: u8, context: &'static str) -> Opcode {
        self.step = Step::Error;
        self.err = Some(SyntaxError {
            kind: SyntaxErrorKind::InvalidCharacter {
                byte: QuotedByte(c),
                context,
            },
            offset: self.bytes,
        });
        Opcode::Error
    }

    fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn replace_top(&mut self, frame: Frame) {
        if let Some(top) = self.frames.last_mut() {
            *top = frame;
        }
    }

    fn pop(&mut self) {
        self.frames.pop();
        if self.frames.is_empty() {
            self.step = Step::EndTop;
            self.end_top = true;
        } else {
            self.step = Step::AfterValue;
        }
    }

    fn begin_string(&mut self, c: u8) -> Opcode {
        self.step = if c == b'0' {
            Step::LengthZero
        } else {
            Step::LengthDigits
        };
        self.length = usize::from(c - b'0');
        self.push(Frame::StringLength);
        Opcode::BeginString
    }

    fn value(&mut self, c: u8) -> Opcode {
        match c {
            b'd' => {
                self.step = Step::DictKeyOrEnd;
                self.push(Frame::DictKey);
                Opcode::BeginDict
            }
            b'l' => {
                self.step = Step::ListValueOrEnd;
                self.push(Frame::ListValue);
                Opcode::BeginList
            }
            b'i' => {
                self.step = Step::IntegerStart;
                self.push(Frame::Integer);
                Opcode::BeginInteger
            }
            b'0'..=b'9' => self.begin_string(c),
            _ => self.fail(c, "looking for value"),
        }
    }

    fn dict_key_or_end(&mut self, c: u8) -> Opcode {
        match c {
            b'e' => {
                self.pop();
                Opcode::EndDict
            }
            b'0'..=b'9' => self.begin_string(c),
            _ => self.fail(c, "looking for string length"),
        }
    }

    fn list_value_or_end(&mut self, c: u8) -> Opcode {
        if c == b'e' {
            self.pop();
            return Opcode::EndList;
        }
        self.value(c)
    }

    fn after_value(&mut self, c: u8) -> Opcode {
        let Some(&top) = self.frames.last() else {
            panic!("{PHASE_PANIC_MSG}");
        };
        match top {
            Frame::DictKey => {
                self.replace_top(Frame::DictValue);
                self.value(c)
            }
            Frame::DictValue => {
                self.replace_top(Frame::DictKey);
                self.dict_key_or_end(c)
            }
            Frame::ListValue => self.list_value_or_end(c),
            Frame::Integer | Frame::StringLength | Frame::StringBody => {
                panic!("{PHASE_PANIC_MSG}")
            }
        }
    }

    fn integer_start(&mut self, c: u8) -> Opcode {
        match c {
            b'-' => self.step = Step::IntegerNegative,
            b'0' => self.step = Step::IntegerZero,
            b'1'..=b'9' => self.step = Step::IntegerMagnitude,
            _ => return self.fail(c, "looking for integer"),
        }
        Opcode::IntegerDigits
    }

    fn integer_negative(&mut self, c: u8) -> Opcode {
        match c {
            b'0' => self.fail(c, "negative zero not allowed"),
            b'1'..=b'9' => {
                self.step = Step::IntegerMagnitude;
                Opcode::Continue
            }
            _ => self.fail(c, "looking for integer"),
        }
    }

    fn integer_zero(&mut self, c: u8) -> Opcode {
        if c == b'e' {
            self.pop();
            return Opcode::EndInteger;
        }
        self.fail(c, "leading zeroes not allowed")
    }

    fn integer_magnitude(&mut self, c: u8) -> Opcode {
        match c {
            b'e' => {
                self.pop();
                Opcode::EndInteger
            }
            b'0'..=b'9' => Opcode::Continue,
            _ => self.fail(c, "looking for integer"),
        }
    }

    fn length_zero(&mut self, c: u8) -> Opcode {
        if c == b':' {
            return self.length_end();
        }
        self.fail(c, "looking for string length delimiter")
    }

    fn length_digits(&mut self, c: u8) -> Opcode {
        match c {
            b':' => self.length_end(),
            b'0'..=b'9' => {
                let Some(length) = self
                    .length
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(usize::from(c - b'0')))
                else {
                    self.step = Step::Error;
                    self.err = Some(SyntaxError {
                        kind: SyntaxErrorKind::LengthOverflow,
                        offset: self.bytes,
                    });
                    return Opcode::Error;
                };
                self.length = length;
                Opcode::Continue
            }
            _ => self.fail(c, "looking for string length digit"),
        }
    }

    fn length_end(&mut self) -> Opcode {
        if self.remaining != 0 {
            panic!("{PHASE_PANIC_MSG}");
        }
        let length = core::mem::take(&mut self.length);
        self.last_len = length;
        self.replace_top(Frame::StringBody);
        if length == 0 {
            self.pop();
            return Opcode::StringBody;
        }
        self.remaining = length;
        self.step = Step::BodyFirst;
        Opcode::Continue
    }

    fn body_first(&mut self) -> Opcode {
        self.remaining -= 1;
        if self.remaining == 0 {
            self.pop();
        } else {
            self.step = Step::Body;
        }
        Opcode::StringBody
    }

    fn body(&mut self) -> Opcode {
        self.remaining -= 1;
        if self.remaining == 0 {
            self.pop();
        }
        Opcode::Continue
    }
}

/// Runs `scan` over all of `data`, requiring exactly one complete value.
///
/// # Errors
///
/// Returns the first [`SyntaxError`] encountered, including a premature end of
/// input.
pub fn check_valid(data: &[u8], scan: &mut Scanner) -> Result<(), SyntaxError> {
    scan.reset();
    for &c in data {
        if scan.step(c) == Opcode::Error {
            return Err(latched(scan));
        }
    }
    if scan.eof() == Opcode::Error {
        return Err(latched(scan));
    }
    Ok(())
}

pub(crate) fn latched(scan: &Scanner) -> SyntaxError {
    scan.error().cloned().unwrap_or(SyntaxError {
        kind: SyntaxErrorKind::UnexpectedEnd,
        offset: scan.offset(),
    })
}

/// Reports whether `data` is exactly one well-formed Bencode value.
///
/// ```rust
/// assert!(bencodec::valid(b"d3:fooi0ee"));
/// assert!(!bencodec::valid(b"i-0e"));
/// ```
#[must_use]
pub fn valid(data: &[u8]) -> bool {
    check_valid(data, &mut Scanner::new()).is_ok()
}

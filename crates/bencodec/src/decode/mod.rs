//! Binding of scanned values into typed destinations.
//!
//! [`DecodeState`] walks the opcode stream of one complete value and hands
//! each token to a [`Decode`] destination, or skips it when there is none.
//! Shape mismatches are recorded (the first one wins) and the offending value
//! is skipped so the cursor never loses sync with the scanner.

use core::any::type_name;

use bstr::{BString, ByteSlice};

use crate::{
    error::{DecodeError, TypeMismatch},
    fields::{Field, Record, cached_fields},
    options::DecoderOptions,
    scanner::{Opcode, PHASE_PANIC_MSG, Scanner},
};

mod impls;


pub use impls::MapKey;

/// A destination that Bencode values can be bound into.
///
/// Every method has a default that reports a type mismatch, so an
/// implementation only overrides the shapes it accepts. `decode_dict` and
/// `decode_list` are called right after the opening byte and must consume the
/// value through its closing `e`, either by iterating with
/// [`DecodeState::enter_dict`] / [`DecodeState::enter_list`] or with
/// [`DecodeState::skip`].
pub trait Decode {
    fn decode_dict(&mut self, d: &mut DecodeState<'_>) {
        d.mismatch("dictionary", type_name::<Self>());
        d.skip();
    }

    fn decode_list(&mut self, d: &mut DecodeState<'_>) {
        d.mismatch("list", type_name::<Self>());
        d.skip();
    }

    /// `digits` is the integer's text between `i` and `e`.
    fn decode_integer(&mut self, digits: &[u8], d: &mut DecodeState<'_>) {
        let _ = digits;
        d.mismatch("number", type_name::<Self>());
    }

    fn decode_string(&mut self, body: &[u8], d: &mut DecodeState<'_>) {
        let _ = body;
        d.mismatch("string", type_name::<Self>());
    }

    /// The record behind this destination, used to walk flattened fields.
    fn as_fields(&mut self) -> Option<&mut dyn Fields> {
        None
    }

    #[doc(hidden)]
    fn vec_from_bytes(bytes: &[u8]) -> Option<Vec<Self>>
    where
        Self: Sized,
    {
        let _ = bytes;
        None
    }
}

/// Positional access to a record's declared fields.
pub trait Fields {
    /// The destination for declared field `index`.
    ///
    /// # Panics
    ///
    /// Panics for an index the record's field table never references.
    fn field_mut(&mut self, index: usize) -> &mut dyn Decode;
}

#[derive(Debug, Clone, Copy, Default)]
struct ErrorContext {
    record: Option<&'static str>,
    field: Option<&'static str>,
    /// Declared type of `field`, reported for mismatches on the field itself.
    ty: Option<&'static str>,
    start: usize,
}

/// One decode session over a single, already validated value.
pub struct DecodeState<'de> {
    data: &'de [u8],
    off: usize,
    opcode: Opcode,
    scan: Scanner,
    start: usize,
    base: u64,
    depth: usize,
    context: ErrorContext,
    saved_error: Option<DecodeError>,
    options: DecoderOptions,
}

impl<'de> DecodeState<'de> {
    pub(crate) fn new(data: &'de [u8], options: DecoderOptions) -> Self {
        Self {
            data,
            off: 0,
            opcode: Opcode::Continue,
            scan: Scanner::new(),
            start: 0,
            base: 0,
            depth: 0,
            context: ErrorContext::default(),
            saved_error: None,
            options,
        }
    }

    /// Offsets reported in errors are shifted by `base`.
    pub(crate) fn with_base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    /// Binds the value in `data` into `dest`, or skips it.
    pub(crate) fn unmarshal(&mut self, dest: Option<&mut dyn Decode>) -> Result<(), DecodeError> {
        self.scan.reset();
        self.scan_next();
        self.value(dest);
        match self.saved_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn read_index(&self) -> usize {
        self.off - 1
    }

    fn scan_next(&mut self) {
        if let Some(&c) = self.data.get(self.off) {
            self.opcode = self.scan.step(c);
            self.off += 1;
        } else {
            self.opcode = self.scan.eof();
            self.off = self.data.len() + 1;
        }
    }

    fn scan_while(&mut self, op: Opcode) {
        while let Some(&c) = self.data.get(self.off) {
            let next = self.scan.step(c);
            self.off += 1;
            if next != op {
                self.opcode = next;
                return;
            }
        }
        self.off = self.data.len() + 1;
        self.opcode = self.scan.eof();
    }

    fn expect(&self, op: Opcode) {
        if self.opcode != op {
            panic!("{PHASE_PANIC_MSG}");
        }
    }

    /// Consumes the rest of the dictionary or list whose opening byte was just
    /// scanned, leaving the cursor on its closing `e`.
    pub fn skip(&mut self) {
        let depth = self.scan.depth();
        loop {
            let Some(&c) = self.data.get(self.off) else {
                panic!("{PHASE_PANIC_MSG}");
            };
            let op = self.scan.step(c);
            self.off += 1;
            if self.scan.depth() < depth {
                self.opcode = op;
                return;
            }
        }
    }

    /// Binds the value starting at the current opcode into `dest`, or skips it,
    /// and advances to the opcode that follows it.
    ///
    /// Dictionaries and lists nested deeper than
    /// [`DecoderOptions::max_depth`] are skipped and reported as
    /// [`DecodeError::DepthLimitExceeded`].
    ///
    /// # Panics
    ///
    /// Panics if the opcode stream is inconsistent with the scanner, which only
    /// happens if a [`Decode`] implementation consumes too little or too much.
    pub fn value(&mut self, dest: Option<&mut dyn Decode>) {
        self.start = self.read_index();
        match self.opcode {
            Opcode::BeginDict => {
                match self.descend(dest) {
                    Some(v) => {
                        v.decode_dict(self);
                        self.depth -= 1;
                    }
                    None => self.skip(),
                }
                self.expect(Opcode::EndDict);
                self.scan_next();
            }
            Opcode::BeginList => {
                match self.descend(dest) {
                    Some(v) => {
                        v.decode_list(self);
                        self.depth -= 1;
                    }
                    None => self.skip(),
                }
                self.expect(Opcode::EndList);
                self.scan_next();
            }
            Opcode::BeginInteger => {
                self.scan_next();
                self.expect(Opcode::IntegerDigits);
                let first = self.read_index();
                self.scan_while(Opcode::Continue);
                self.expect(Opcode::EndInteger);
                let data = self.data;
                let digits = &data[first..self.read_index()];
                if let Some(v) = dest {
                    v.decode_integer(digits, self);
                }
                self.scan_next();
            }
            Opcode::BeginString => {
                let body = self.string_body();
                if let Some(v) = dest {
                    v.decode_string(body, self);
                }
            }
            _ => panic!("{PHASE_PANIC_MSG}"),
        }
    }

    /// Claims one nesting level for `dest`; `None` means skip the value.
    fn descend<'d>(&mut self, dest: Option<&'d mut dyn Decode>) -> Option<&'d mut dyn Decode> {
        let dest = dest?;
        if self.depth >= self.options.max_depth {
            self.save_error(DecodeError::DepthLimitExceeded {
                limit: self.options.max_depth,
                offset: self.base + self.start as u64,
            });
            return None;
        }
        self.depth += 1;
        Some(dest)
    }

    fn string_body(&mut self) -> &'de [u8] {
        self.scan_while(Opcode::Continue);
        self.expect(Opcode::StringBody);
        let len = self.scan.string_len();
        let first = if len == 0 { self.off } else { self.read_index() };
        self.scan_while(Opcode::Continue);
        let data = self.data;
        &data[first..first + len]
    }

    /// Enters the dictionary whose `d` was just scanned.
    pub fn enter_dict(&mut self) {
        self.scan_next();
    }

    /// The next key of the current dictionary, or `None` at its closing `e`.
    ///
    /// A returned key must be followed by exactly one call to
    /// [`value`](Self::value).
    pub fn next_key(&mut self) -> Option<&'de [u8]> {
        match self.opcode {
            Opcode::EndDict => None,
            Opcode::BeginString => {
                self.start = self.read_index();
                Some(self.string_body())
            }
            _ => panic!("{PHASE_PANIC_MSG}"),
        }
    }

    /// Enters the list whose `l` was just scanned.
    pub fn enter_list(&mut self) {
        self.scan_next();
    }

    /// Whether another element precedes the closing `e` of the current list.
    ///
    /// Every `true` must be followed by exactly one call to
    /// [`value`](Self::value).
    pub fn next_element(&mut self) -> bool {
        match self.opcode {
            Opcode::EndList => false,
            Opcode::BeginDict | Opcode::BeginList | Opcode::BeginInteger | Opcode::BeginString => {
                true
            }
            _ => panic!("{PHASE_PANIC_MSG}"),
        }
    }

    /// Records that the current value cannot be stored in `target`.
    pub fn mismatch(&mut self, value: impl Into<String>, target: &'static str) {
        self.save_error(TypeMismatch {
            value: value.into(),
            target,
            offset: self.base + self.start as u64,
            record: None,
            field: None,
        });
    }

    /// Saves `err` unless an earlier error is already saved.
    pub fn save_error(&mut self, err: impl Into<DecodeError>) {
        if self.saved_error.is_some() {
            return;
        }
        let err = self.add_error_context(err.into());
        #[cfg(any(test, feature = "fuzzing"))]
        if self.options.panic_on_error {
            panic!("{err}");
        }
        self.saved_error = Some(err);
    }

    fn add_error_context(&self, err: DecodeError) -> DecodeError {
        match err {
            DecodeError::TypeMismatch(mut m) if self.context.record.is_some() => {
                m.record = self.context.record;
                m.field = self.context.field;
                if m.offset == self.base + self.context.start as u64 {
                    m.target = self.context.ty.unwrap_or(m.target);
                }
                DecodeError::TypeMismatch(m)
            }
            other => other,
        }
    }

    /// Binds the dictionary whose `d` was just scanned into record `target`.
    ///
    /// Keys match a field name exactly first, then case-insensitively. Unknown
    /// keys are skipped, or reported with
    /// [`DecoderOptions::disallow_unknown_fields`].
    pub fn record<T: Record>(&mut self, target: &mut T) {
        let fields = cached_fields::<T>();
        let outer = self.context;
        self.enter_dict();
        while let Some(key) = self.next_key() {
            let Some(field) = lookup(&fields, key) else {
                if self.options.disallow_unknown_fields {
                    self.save_error(DecodeError::UnknownField(BString::from(key)));
                }
                self.value(None);
                continue;
            };
            self.context = ErrorContext {
                record: Some(T::NAME),
                field: Some(field.name),
                ty: Some(field.ty),
                start: self.read_index(),
            };
            if field.quoted {
                self.save_error(DecodeError::QuotedField {
                    record: T::NAME,
                    field: field.name,
                });
                self.value(None);
            } else if let Some(slot) = resolve(&mut *target, &field.index) {
                self.value(Some(slot));
            } else {
                self.save_error(DecodeError::NotARecord {
                    record: T::NAME,
                    field: field.name,
                });
                self.value(None);
            }
            self.context = outer;
        }
    }
}

fn lookup<'f>(fields: &'f [Field], key: &[u8]) -> Option<&'f Field> {
    fields
        .iter()
        .find(|f| f.name_bytes == key)
        .or_else(|| fields.iter().find(|f| (f.equal_fold)(f.name_bytes, key)))
}

/// Walks `index` from `root`, allocating optional intermediates on the way.
fn resolve<'a>(root: &'a mut dyn Fields, index: &[usize]) -> Option<&'a mut dyn Decode> {
    let (&last, path) = index.split_last()?;
    let mut cur = root;
    for &i in path {
        cur = cur.field_mut(i).as_fields()?;
    }
    Some(cur.field_mut(last))
}

impl core::fmt::Debug for DecodeState<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DecodeState")
            .field("data", &self.data.as_bstr())
            .field("off", &self.off)
            .field("opcode", &self.opcode)
            .field("depth", &self.scan.depth())
            .finish_non_exhaustive()
    }
}

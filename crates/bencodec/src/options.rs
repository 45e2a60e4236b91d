/// Default for [`DecoderOptions::max_depth`].
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Configuration for a decode session.
///
/// Used by [`unmarshal_with_options`](crate::unmarshal_with_options) and
/// [`Decoder::with_options`](crate::Decoder::with_options).
///
/// ```rust
/// use bencodec::DecoderOptions;
///
/// let options = DecoderOptions {
///     disallow_unknown_fields: true,
///     ..Default::default()
/// };
/// # let _ = options;
/// ```
///
/// # Default
///
/// Flags default to `false`; `max_depth` to [`DEFAULT_MAX_DEPTH`].
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Report dictionary keys that match no field of the destination record.
    ///
    /// The first such key is returned as
    /// [`DecodeError::UnknownField`](crate::DecodeError::UnknownField); decoding
    /// still runs to the end of the value so the input stays in sync.
    ///
    /// # Default
    ///
    /// `false`
    pub disallow_unknown_fields: bool,

    /// Deepest nesting of dictionaries and lists bound into destinations.
    ///
    /// Binding recurses once per level. A container past the limit is skipped
    /// and reported as
    /// [`DecodeError::DepthLimitExceeded`](crate::DecodeError::DepthLimitExceeded).
    /// Skipped values and validation are not limited.
    ///
    /// # Default
    ///
    /// [`DEFAULT_MAX_DEPTH`]
    pub max_depth: usize,

    #[cfg(any(test, feature = "fuzzing"))]
    /// Panic on the first recorded decode error instead of saving it.
    ///
    /// Enabled only in test builds to produce backtraces.
    pub panic_on_error: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            disallow_unknown_fields: false,
            max_depth: DEFAULT_MAX_DEPTH,
            #[cfg(any(test, feature = "fuzzing"))]
            panic_on_error: false,
        }
    }
}

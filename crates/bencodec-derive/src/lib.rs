use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod record;

/// Derives `Record`, `Fields`, `Embed` and `Decode` for a struct with named
/// fields, so dictionaries bind into it by key.
///
/// Field attributes, all under `#[bencode(...)]`:
/// - `rename = "key"`: bind from `key` instead of the field name.
/// - `flatten`: promote the fields of a nested record into this one.
/// - `skip`: never bind this field.
/// - `omit_empty`: recorded for encoders, ignored when decoding.
/// - `string`: quoted-string decoding; reported as unsupported.
#[proc_macro_derive(Record, attributes(bencode))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match record::expand_record(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{
    Data, DeriveInput, Error, Field, Fields, LitStr, Result, Visibility, ext::IdentExt,
    spanned::Spanned,
};

pub(crate) fn expand_record(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        Err(Error::new(
            input.span(),
            "`Record` may only be derived on structs.",
        ))?
    };

    let Fields::Named(fields) = &data.fields else {
        Err(Error::new(
            input.span(),
            "`Record` may only be derived on structs with named fields.",
        ))?
    };

    let fields = fields
        .named
        .iter()
        .map(FieldMetadata::parse)
        .collect::<Result<Vec<_>>>()?;

    let name = &input.ident;
    let name_str = name.unraw().to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let declared = fields.iter().map(FieldMetadata::declared);
    let arms = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.bindable())
        .map(|(i, f)| {
            let member = &f.ident;
            quote! { #i => &mut self.#member as &mut dyn ::bencodec::Decode, }
        });

    Ok(quote! {
        impl #impl_generics ::bencodec::Record for #name #ty_generics #where_clause {
            const NAME: &'static str = #name_str;
            const FIELDS: &'static [::bencodec::DeclaredField] = &[#(#declared),*];
        }

        impl #impl_generics ::bencodec::Embed for #name #ty_generics #where_clause {
            fn shape() -> ::bencodec::RecordShape {
                ::bencodec::RecordShape::of::<Self>()
            }
        }

        impl #impl_generics ::bencodec::Fields for #name #ty_generics #where_clause {
            fn field_mut(&mut self, index: usize) -> &mut dyn ::bencodec::Decode {
                match index {
                    #(#arms)*
                    _ => ::core::panic!("{} has no bindable field {}", #name_str, index),
                }
            }
        }

        impl #impl_generics ::bencodec::Decode for #name #ty_generics #where_clause {
            fn decode_dict(&mut self, d: &mut ::bencodec::DecodeState<'_>) {
                d.record(self);
            }

            fn as_fields(&mut self) -> ::core::option::Option<&mut dyn ::bencodec::Fields> {
                ::core::option::Option::Some(self)
            }
        }
    })
}

#[derive(Debug)]
struct FieldMetadata {
    ident: syn::Ident,
    ty: syn::Type,
    exported: bool,
    rename: Option<LitStr>,
    omit_empty: bool,
    skip: bool,
    flatten: bool,
    quoted: bool,
}

impl FieldMetadata {
    fn parse(field: &Field) -> Result<Self> {
        let Some(ident) = field.ident.clone() else {
            Err(Error::new(field.span(), "Expected a named field."))?
        };

        let mut meta = Self {
            ident,
            ty: field.ty.clone(),
            exported: !matches!(field.vis, Visibility::Inherited),
            rename: None,
            omit_empty: false,
            skip: false,
            flatten: false,
            quoted: false,
        };

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("bencode")) {
            attr.parse_nested_meta(|nested| {
                if nested.path.is_ident("rename") {
                    meta.rename = Some(nested.value()?.parse()?);
                } else if nested.path.is_ident("omit_empty") {
                    meta.omit_empty = true;
                } else if nested.path.is_ident("skip") {
                    meta.skip = true;
                } else if nested.path.is_ident("flatten") {
                    meta.flatten = true;
                } else if nested.path.is_ident("string") {
                    meta.quoted = true;
                } else {
                    Err(nested.error("Unsupported `bencode` attribute."))?;
                }
                Ok(())
            })?;
        }

        if meta.skip && meta.flatten {
            Err(Error::new(
                field.span(),
                "`skip` and `flatten` are mutually exclusive.",
            ))?;
        }

        Ok(meta)
    }

    fn bindable(&self) -> bool {
        !self.skip && (self.exported || self.flatten)
    }

    fn declared(&self) -> TokenStream {
        let name = self.ident.unraw().to_string();
        let ty = &self.ty;
        let ty_str = type_name(ty);
        let tag = match &self.rename {
            Some(lit) => quote! { ::core::option::Option::Some(#lit) },
            None => quote! { ::core::option::Option::None },
        };
        let embedded = if self.flatten {
            quote! {
                ::core::option::Option::Some(
                    <#ty as ::bencodec::Embed>::shape as fn() -> ::bencodec::RecordShape
                )
            }
        } else {
            quote! { ::core::option::Option::None }
        };
        let (exported, skip, omit_empty, quoted) =
            (self.exported, self.skip, self.omit_empty, self.quoted);

        quote! {
            ::bencodec::DeclaredField {
                name: #name,
                tag: #tag,
                ty: #ty_str,
                exported: #exported,
                skip: #skip,
                omit_empty: #omit_empty,
                quoted: #quoted,
                embedded: #embedded,
            }
        }
    }
}

/// Renders a type the way it was written, without token spacing.
fn type_name(ty: &syn::Type) -> String {
    ty.to_token_stream()
        .to_string()
        .replace(" :: ", "::")
        .replace(" <", "<")
        .replace("< ", "<")
        .replace(" >", ">")
        .replace(" ,", ",")
        .replace("& ", "&")
}

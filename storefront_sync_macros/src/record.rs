use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Path};

pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let (collection, merge) = match parse_struct_attrs(&input) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };

    let (id_field, key_fields) = match parse_fields(&input) {
        Ok(fields) => fields,
        Err(err) => return err.to_compile_error().into(),
    };

    let natural_key = if key_fields.is_empty() {
        quote! { self.#id_field.clone() }
    } else {
        quote! {
            let parts: ::std::vec::Vec<::std::string::String> = vec![
                #(storefront_sync::KeyPart::key_part(&self.#key_fields)),*
            ];
            parts.join(":")
        }
    };

    let absorb = match merge {
        Some(path) => quote! {
            fn absorb(&self, existing: &Self) -> Self {
                #path(self, existing)
            }
        },
        None => quote! {},
    };

    let expanded = quote! {
        impl storefront_sync::Record for #name {
            const COLLECTION: &'static str = #collection;

            fn id(&self) -> &str {
                &self.#id_field
            }

            fn set_id(&mut self, id: ::std::string::String) {
                self.#id_field = id;
            }

            fn natural_key(&self) -> ::std::string::String {
                #natural_key
            }

            #absorb
        }
    };

    TokenStream::from(expanded)
}

fn parse_struct_attrs(input: &DeriveInput) -> syn::Result<(String, Option<Path>)> {
    let mut collection = None;
    let mut merge = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("merge") {
                let value: Path = meta.value()?.parse()?;
                merge = Some(value);
                Ok(())
            } else {
                Err(meta.error("expected `collection` or `merge`"))
            }
        })?;
    }

    // Default: snake_case struct name + "s"
    let collection =
        collection.unwrap_or_else(|| format!("{}s", to_snake_case(&input.ident.to_string())));

    Ok((collection, merge))
}

fn parse_fields(input: &DeriveInput) -> syn::Result<(Ident, Vec<Ident>)> {
    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Record derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Record derive only supports structs",
            ))
        }
    };

    let mut id_field = None;
    let mut key_fields = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        for attr in &field.attrs {
            if !attr.path().is_ident("record") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    id_field = Some(ident.clone());
                    Ok(())
                } else if meta.path.is_ident("key") {
                    key_fields.push(ident.clone());
                    Ok(())
                } else {
                    Err(meta.error("expected `id` or `key`"))
                }
            })?;
        }
    }

    // Default: look for a field named "id"
    let id_field = match id_field {
        Some(ident) => ident,
        None => fields
            .iter()
            .filter_map(|field| field.ident.clone())
            .find(|ident| ident == "id")
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    &input.ident,
                    "Record derive: no field marked with #[record(id)] and no field named `id`",
                )
            })?,
    };

    Ok((id_field, key_fields))
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

use darling::{FromDeriveInput, FromField, FromMeta, ast::Data, util::Ignored};
use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::{DeriveInput, Generics, Path, WherePredicate, parse_quote};

use crate::fields::{FieldIdent, add_bounds, members};

#[derive(FromMeta)]
struct PathOverrides {
    #[darling(default = "default_zero_path")]
    zero: Path,
}

impl Default for PathOverrides {
    fn default() -> Self {
        Self {
            zero: default_zero_path(),
        }
    }
}

fn default_zero_path() -> Path {
    parse_quote!(::copilot_manifest::config::zero)
}

#[derive(FromDeriveInput)]
#[darling(attributes(is_zero), supports(struct_any))]
struct IsZeroInput {
    ident: Ident,
    generics: Generics,
    data: Data<Ignored, IsZeroField>,
    #[darling(default)]
    path_overrides: PathOverrides,
    #[darling(default)]
    bound: Option<Vec<WherePredicate>>,
}

#[derive(FromField)]
struct IsZeroField {
    ident: Option<Ident>,
}

impl FieldIdent for IsZeroField {
    fn ident(&self) -> Option<&Ident> {
        self.ident.as_ref()
    }
}

pub fn derive(input: DeriveInput) -> TokenStream {
    let IsZeroInput {
        ident,
        mut generics,
        data,
        path_overrides: PathOverrides { zero: zero_mod },
        bound,
    } = match IsZeroInput::from_derive_input(&input) {
        Ok(input) => input,
        Err(err) => return err.write_errors(),
    };
    // Enums are rejected by `supports` above.
    let Some(fields) = data.take_struct() else {
        return TokenStream::new();
    };
    let members = members(&fields);

    add_bounds(&mut generics, bound);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    quote! {
        impl #impl_generics #zero_mod::IsZero for #ident #ty_generics #where_clause {
            fn is_zero(&self) -> bool {
                true #( && #zero_mod::IsZero::is_zero(&self.#members) )*
            }
        }
    }
}

use darling::{
    FromDeriveInput, FromField, FromMeta, FromVariant,
    ast::{Data, Fields},
};
use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::{DeriveInput, Generics, Path, WherePredicate, parse_quote};

use crate::fields::{FieldIdent, add_bounds, bindings, members};

#[derive(FromMeta)]
struct PathOverrides {
    #[darling(default = "default_merge_path")]
    merge: Path,
}

impl Default for PathOverrides {
    fn default() -> Self {
        Self {
            merge: default_merge_path(),
        }
    }
}

fn default_merge_path() -> Path {
    parse_quote!(::copilot_manifest::config::merge)
}

#[derive(FromDeriveInput)]
#[darling(attributes(merge), supports(struct_any, enum_any))]
struct MergeInput {
    ident: Ident,
    generics: Generics,
    data: Data<MergeVariant, MergeField>,
    #[darling(default)]
    path_overrides: PathOverrides,
    #[darling(default)]
    bound: Option<Vec<WherePredicate>>,
}

#[derive(FromField)]
struct MergeField {
    ident: Option<Ident>,
}

impl FieldIdent for MergeField {
    fn ident(&self) -> Option<&Ident> {
        self.ident.as_ref()
    }
}

#[derive(FromVariant)]
struct MergeVariant {
    ident: Ident,
    fields: Fields<MergeField>,
}

pub fn derive(input: DeriveInput) -> TokenStream {
    let MergeInput {
        ident,
        mut generics,
        data,
        path_overrides: PathOverrides { merge: merge_mod },
        bound,
    } = match MergeInput::from_derive_input(&input) {
        Ok(input) => input,
        Err(err) => return err.write_errors(),
    };

    let body = match &data {
        Data::Struct(fields) => struct_body(&merge_mod, fields),
        Data::Enum(variants) => enum_body(&merge_mod, variants),
    };

    add_bounds(&mut generics, bound);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    quote! {
        impl #impl_generics #merge_mod::Merge for #ident #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn merge(&mut self, defaults: &Self) {
                #body
            }
        }
    }
}

/// Every field is merged with its counterpart in `defaults`.
fn struct_body(merge_mod: &Path, fields: &Fields<MergeField>) -> TokenStream {
    let members = members(fields);
    quote! {
        #( #merge_mod::Merge::merge(&mut self.#members, &defaults.#members); )*
    }
}

/// Fields are only merged when both sides hold the same variant. Otherwise `self` is kept as a
/// whole, and nothing of the other variant leaks into it.
fn enum_body(merge_mod: &Path, variants: &[MergeVariant]) -> TokenStream {
    let arms = variants.iter().map(|MergeVariant { ident, fields }| {
        let members = members(fields);
        let overrides = bindings("overrides", &members);
        let defaults = bindings("defaults", &members);
        quote! {
            (
                Self::#ident { #( #members: #overrides ),* },
                Self::#ident { #( #members: #defaults ),* },
            ) => {
                #( #merge_mod::Merge::merge(#overrides, #defaults); )*
            }
        }
    });

    quote! {
        match (self, defaults) {
            #( #arms )*
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }
}

use darling::ast::Fields;
use proc_macro2::Ident;
use quote::format_ident;
use syn::{Generics, Index, Member, WherePredicate, ext::IdentExt};

/// A field parsed by darling, named or positional.
pub trait FieldIdent {
    fn ident(&self) -> Option<&Ident>;
}

/// The members of `fields`, usable both as `self.#member` and in braced patterns.
pub fn members<F: FieldIdent>(fields: &Fields<F>) -> Vec<Member> {
    fields
        .iter()
        .enumerate()
        .map(|(index, field)| match field.ident() {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        })
        .collect()
}

/// Pattern bindings for `members`, such as `defaults_cpu` or `defaults_0`.
pub fn bindings(prefix: &str, members: &[Member]) -> Vec<Ident> {
    members
        .iter()
        .map(|member| match member {
            Member::Named(ident) => format_ident!("{prefix}_{}", ident.unraw()),
            Member::Unnamed(index) => format_ident!("{prefix}_{}", index.index),
        })
        .collect()
}

pub fn add_bounds(generics: &mut Generics, bound: Option<Vec<WherePredicate>>) {
    if let Some(bound) = bound {
        generics.make_where_clause().predicates.extend(bound);
    }
}

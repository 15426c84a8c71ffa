use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod fields;
mod is_zero;
mod merge;

/// Derives `copilot_manifest::config::merge::Merge` for structs and enums.
///
/// Structs are merged field by field. Enums are merged field by field when both sides hold the
/// same variant, otherwise the overriding value is kept as a whole.
///
/// ```
/// # use copilot_manifest::config::merge::{Merge, merge};
/// #[derive(Clone, Debug, Merge, PartialEq)]
/// struct TaskConfig {
///     cpu: Option<u32>,
///     memory: Option<u32>,
/// }
///
/// let resolved = merge(
///     TaskConfig { cpu: Some(512), memory: None },
///     &TaskConfig { cpu: Some(256), memory: Some(1024) },
/// );
/// assert_eq!(resolved, TaskConfig { cpu: Some(512), memory: Some(1024) });
/// ```
///
/// Types inside `copilot-manifest` itself refer to the trait through
/// `#[merge(path_overrides(merge = "crate::config::merge"))]`. Extra where clauses can be
/// supplied with `#[merge(bound = "T: Merge")]`.
#[proc_macro_derive(Merge, attributes(merge))]
pub fn derive_merge(input: TokenStream) -> TokenStream {
    merge::derive(parse_macro_input!(input as DeriveInput)).into()
}

/// Derives `copilot_manifest::config::zero::IsZero` for structs.
///
/// A struct is zero if every one of its fields is zero.
///
/// ```
/// # use copilot_manifest::config::zero::IsZero;
/// #[derive(Default, IsZero)]
/// struct AccessLogs {
///     bucket_name: Option<String>,
///     prefix: Option<String>,
/// }
///
/// assert!(AccessLogs::default().is_zero());
/// assert!(!AccessLogs { bucket_name: Some("logs".to_owned()), prefix: None }.is_zero());
/// ```
#[proc_macro_derive(IsZero, attributes(is_zero))]
pub fn derive_is_zero(input: TokenStream) -> TokenStream {
    is_zero::derive(parse_macro_input!(input as DeriveInput)).into()
}

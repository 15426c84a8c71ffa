//! Emptiness checks used to tell "not specified" apart from "specified".
//!
//! [`IsZero`] mirrors what an unset field looks like after deserialization: `None`, an empty
//! collection, `0`, `false` or a struct made up of nothing but such fields.
use std::collections::{BTreeMap, HashMap};

pub use copilot_manifest_derive::IsZero;

use crate::time::Duration;

/// A type that can tell whether it holds its zero value.
///
/// Structs usually derive this with [`#[derive(IsZero)]`](`derive@IsZero`), in which case they
/// are zero if every field is zero.
pub trait IsZero {
    fn is_zero(&self) -> bool;
}

macro_rules! is_zero_numeric {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IsZero for $ty {
                fn is_zero(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

is_zero_numeric!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl IsZero for bool {
    fn is_zero(&self) -> bool {
        !*self
    }
}

impl IsZero for String {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl IsZero for Duration {
    fn is_zero(&self) -> bool {
        std::time::Duration::is_zero(self)
    }
}

impl<T> IsZero for Option<T> {
    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<T: IsZero> IsZero for Box<T> {
    fn is_zero(&self) -> bool {
        T::is_zero(self)
    }
}

impl<T> IsZero for Vec<T> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> IsZero for BTreeMap<K, V> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> IsZero for HashMap<K, V, S> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

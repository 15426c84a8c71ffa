use std::{
    collections::{BTreeMap, HashMap, btree_map, hash_map},
    hash::Hash,
};

pub use copilot_manifest_derive::Merge;

use crate::time::Duration;

/// A type that can be merged with itself
///
/// This is the engine behind environment overrides: the fragment written under
/// `environments.<name>` is merged on top of the base configuration of the manifest, and
/// whatever the fragment leaves unset is inherited from the base.
///
/// Most users will want to implement this for custom types using [the associated derive macro](`derive@Merge`).
///
/// # Example
///
/// ```
/// # use copilot_manifest::config::merge::Merge;
///
/// #[derive(Merge, Debug, PartialEq, Eq)]
/// struct Foo {
///     bar: Option<u8>,
///     baz: Option<u8>,
/// }
///
/// let mut config = Foo {
///     bar: Some(0),
///     baz: None,
/// };
/// config.merge(&Foo {
///     bar: Some(1),
///     baz: Some(2),
/// });
/// assert_eq!(config, Foo {
///     bar: Some(0), // Overridden by `bar: Some(0)` above, even though it is zero
///     baz: Some(2), // Fallback is used
/// });
/// ```
///
/// # Field shapes
///
/// - Scalars that may be left out should be [`Option`]al, so that an explicit zero value
///   (`Some(0)`, `Some(false)`) can be told apart from "not specified" (`None`).
/// - Lists should be `Option<Vec<T>>`. [`Vec`] is [`Atomic`], so a list in the override
///   replaces the base list as a whole, even when it is empty.
/// - Maps are upserted key by key, values present on both sides are merged recursively.
/// - Composite objects (such as regular structs) should generally *not* be optional.
pub trait Merge {
    /// Merge with `defaults`, preferring values from `self` if they are set there
    fn merge(&mut self, defaults: &Self);
}

impl<T: Merge> Merge for Box<T> {
    fn merge(&mut self, defaults: &Self) {
        T::merge(self, defaults);
    }
}

impl<K: Ord + Clone, V: Merge + Clone> Merge for BTreeMap<K, V> {
    fn merge(&mut self, defaults: &Self) {
        for (k, default_v) in defaults {
            match self.entry(k.clone()) {
                btree_map::Entry::Occupied(mut entry) => {
                    entry.get_mut().merge(default_v);
                }
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(default_v.clone());
                }
            }
        }
    }
}

impl<K: Hash + Eq + Clone, V: Merge + Clone> Merge for HashMap<K, V> {
    fn merge(&mut self, defaults: &Self) {
        for (k, default_v) in defaults {
            match self.entry(k.clone()) {
                hash_map::Entry::Occupied(mut entry) => {
                    entry.get_mut().merge(default_v);
                }
                hash_map::Entry::Vacant(entry) => {
                    entry.insert(default_v.clone());
                }
            }
        }
    }
}

/// `None` inherits the defaults wholesale. When both sides are set the values are merged, which
/// keeps `self` for [`Atomic`] values and recurses into anything else.
impl<T: Merge + Clone> Merge for Option<T> {
    fn merge(&mut self, defaults: &Self) {
        match (self, defaults) {
            (Some(this), Some(defaults)) => this.merge(defaults),
            (this @ None, defaults) => this.clone_from(defaults),
            (Some(_), None) => {}
        }
    }
}

/// Moving version of [`Merge::merge`]
///
/// Neither argument is modified in place by the caller's view: `overrides` is consumed and
/// `defaults` is only read, so the result never shares state with either input.
pub fn merge<T: Merge>(mut overrides: T, defaults: &T) -> T {
    overrides.merge(defaults);
    overrides
}

/// A marker trait for types that are merged atomically (as one single value) rather than
/// trying to merge each field individually
///
/// Merging two atomic values always keeps `self`. Use [`atomic!`](crate::atomic) to mark a
/// type as atomic, which implements both this trait and [`Merge`].
pub trait Atomic: Clone {}

/// Implements [`Atomic`] and a [`Merge`] that keeps the overriding value for each listed type.
#[macro_export]
macro_rules! atomic {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::config::merge::Atomic for $ty {}
            impl $crate::config::merge::Merge for $ty {
                fn merge(&mut self, _defaults: &Self) {}
            }
        )*
    };
}

atomic!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, String, Duration,
);

impl<T: Clone> Atomic for Vec<T> {}
impl<T: Clone> Merge for Vec<T> {
    fn merge(&mut self, _defaults: &Self) {}
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::{Merge, merge};

    /// Sums on merge, which makes recursion into map values observable.
    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Replicas(u8);

    impl Merge for Replicas {
        fn merge(&mut self, defaults: &Self) {
            self.0 += defaults.0;
        }
    }

    #[derive(Clone, Debug, Default, Merge, PartialEq, Eq)]
    #[merge(path_overrides(merge = "super"))]
    struct HealthCheck {
        path: Option<String>,
        retries: Option<u8>,
    }

    #[derive(Clone, Debug, Default, Merge, PartialEq, Eq)]
    #[merge(path_overrides(merge = "super"))]
    struct Task {
        cpu: Option<u32>,
        exec: Option<bool>,
        command: Option<Vec<String>>,
        healthcheck: HealthCheck,
    }

    #[test]
    fn explicit_zero_wins() {
        let base = Task {
            cpu: Some(24),
            exec: Some(true),
            ..Default::default()
        };

        let resolved = merge(
            Task {
                cpu: Some(0),
                exec: Some(false),
                ..Default::default()
            },
            &base,
        );
        assert_eq!(resolved.cpu, Some(0));
        assert_eq!(resolved.exec, Some(false));

        assert_eq!(merge(Task::default(), &base), base);
    }

    #[test]
    fn nested_structs_merge_field_by_field() {
        let base = Task {
            healthcheck: HealthCheck {
                path: Some("/".to_owned()),
                retries: Some(2),
            },
            ..Default::default()
        };
        let overrides = Task {
            cpu: Some(512),
            healthcheck: HealthCheck {
                path: None,
                retries: Some(5),
            },
            ..Default::default()
        };

        assert_eq!(
            merge(overrides, &base),
            Task {
                cpu: Some(512),
                healthcheck: HealthCheck {
                    path: Some("/".to_owned()),
                    retries: Some(5),
                },
                ..Default::default()
            }
        );
    }

    #[test]
    fn optional_structs() {
        let base = Some(HealthCheck {
            path: Some("/".to_owned()),
            retries: Some(2),
        });
        let overrides = Some(HealthCheck {
            path: None,
            retries: Some(5),
        });

        assert_eq!(
            merge(overrides, &base),
            Some(HealthCheck {
                path: Some("/".to_owned()),
                retries: Some(5),
            })
        );
        assert_eq!(merge(None, &base), base);
        assert_eq!(
            merge(base.clone(), &None),
            base,
            "an unset base must not clear the override"
        );
    }

    #[test]
    fn lists_are_replaced() {
        let base = Task {
            command: Some(vec!["a".to_owned(), "b".to_owned()]),
            ..Default::default()
        };
        let with_command = |command: Option<Vec<String>>| Task {
            command,
            ..Default::default()
        };

        assert_eq!(
            merge(with_command(Some(vec!["c".to_owned()])), &base).command,
            Some(vec!["c".to_owned()])
        );
        assert_eq!(
            merge(with_command(Some(Vec::new())), &base).command,
            Some(Vec::new())
        );
        assert_eq!(merge(with_command(None), &base).command, base.command);
    }

    #[test]
    fn scalar_maps_are_upserted() {
        let base = BTreeMap::from([
            ("var1".to_owned(), "a".to_owned()),
            ("var2".to_owned(), "b".to_owned()),
        ]);
        let overrides = BTreeMap::from([
            ("var1".to_owned(), "c".to_owned()),
            ("var3".to_owned(), "d".to_owned()),
        ]);

        assert_eq!(
            merge(overrides, &base),
            BTreeMap::from([
                ("var1".to_owned(), "c".to_owned()),
                ("var2".to_owned(), "b".to_owned()),
                ("var3".to_owned(), "d".to_owned()),
            ])
        );
        assert_eq!(merge(BTreeMap::new(), &base), base);
    }

    #[test]
    fn map_values_are_merged() {
        let expected = [("api", Replicas(4)), ("web", Replicas(2)), ("worker", Replicas(5))];
        assert_eq!(
            merge(
                BTreeMap::from([("api", Replicas(1)), ("web", Replicas(2))]),
                &BTreeMap::from([("api", Replicas(3)), ("worker", Replicas(5))])
            ),
            BTreeMap::from(expected.clone())
        );
        assert_eq!(
            merge(
                HashMap::from([("api", Replicas(1)), ("web", Replicas(2))]),
                &HashMap::from([("api", Replicas(3)), ("worker", Replicas(5))])
            ),
            HashMap::from(expected)
        );
    }

    #[test]
    fn derive_supports_tuples_and_generics() {
        #[derive(Debug, Merge, PartialEq, Eq)]
        #[merge(path_overrides(merge = "super"))]
        struct Port(Option<u16>, Option<String>);

        #[derive(Debug, Merge, PartialEq, Eq)]
        #[merge(bound = "T: Merge", path_overrides(merge = "super"))]
        struct Scaling<T> {
            value: T,
            cooldown: Option<u32>,
        }

        assert_eq!(
            merge(Port(Some(443), None), &Port(Some(80), Some("tcp".to_owned()))),
            Port(Some(443), Some("tcp".to_owned()))
        );
        assert_eq!(
            merge(
                Scaling {
                    value: Some(70),
                    cooldown: None,
                },
                &Scaling {
                    value: None,
                    cooldown: Some(60),
                }
            ),
            Scaling {
                value: Some(70),
                cooldown: Some(60),
            }
        );
    }

    #[test]
    fn derived_enums_only_merge_matching_variants() {
        #[derive(Clone, Debug, Merge, PartialEq, Eq)]
        #[merge(path_overrides(merge = "super"))]
        enum Placement {
            Subnets {
                ids: Option<Vec<String>>,
                tags: Option<String>,
            },
            Named(Option<String>),
        }

        let subnets = Placement::Subnets {
            ids: None,
            tags: Some("public".to_owned()),
        };
        assert_eq!(
            merge(
                Placement::Subnets {
                    ids: Some(vec!["subnet-1".to_owned()]),
                    tags: None,
                },
                &subnets,
            ),
            Placement::Subnets {
                ids: Some(vec!["subnet-1".to_owned()]),
                tags: Some("public".to_owned()),
            }
        );
        assert_eq!(
            merge(Placement::Named(None), &subnets),
            Placement::Named(None),
            "a different variant replaces the defaults as a whole"
        );
    }
}

//! The override machinery behind manifests.
//!
//! # Why is this needed?
//!
//! A manifest describes a workload once, and then lets each environment change a few keys:
//!
//! ```yaml
//! cpu: 256
//! variables:
//!   LOG_LEVEL: info
//! environments:
//!   prod:
//!     cpu: 1024
//! ```
//!
//! The `prod` block is written in the same shape as the base configuration, but with every
//! key optional. Resolving `prod` means laying that block over the base, key by key, so that
//! whatever `prod` leaves out is inherited.
//!
//! # How does it work?
//!
//! The system is split into three parts:
//!
//! - [`merge`] lays one value over another. Scalars and lists are replaced, maps are upserted
//!   key by key and structs are merged field by field. Types opt out of recursion by being
//!   [`Atomic`](merge::Atomic).
//! - [`zero`] answers whether a value is entirely empty, which is how a structured block
//!   that decoded from nothing is told apart from one that was actually written.
//! - [`union`] holds fields that can be written either as a scalar shorthand or as a
//!   structured block, such as `http: false` versus `http: {path: /}`.
//!
//! [`Merge`](merge::Merge) and [`IsZero`](zero::IsZero) come with derive macros, so a new
//! configuration block usually only needs:
//!
//! ```
//! # use copilot_manifest::config::{merge::Merge, zero::IsZero};
//! #[derive(Clone, Default, IsZero, Merge)]
//! struct Retention {
//!     days: Option<u16>,
//! }
//! ```

pub mod merge;
pub mod union;
pub mod zero;

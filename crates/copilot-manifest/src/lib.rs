//! A typed model of AWS Copilot workload and environment manifests.
//!
//! - [`manifest`] decodes manifests and resolves them for a single environment.
//! - [`validation`] checks a resolved manifest for semantic problems.
//! - [`config`] holds the override engine that the manifests are built on.

pub mod config;
pub mod manifest;
pub mod time;
pub mod validation;
pub mod workload;
pub mod yaml;

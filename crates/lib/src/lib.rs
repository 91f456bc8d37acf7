//! tpb-lib: lifecycle management for third-party bundles.
//!
//! Bundles are optional payloads layered over a base system whose own
//! content is managed by an external update agent. This crate owns their
//! on-disk state:
//! - `Host`: the lock-holding session every operation runs under
//! - `install`, `update`, `remove`: the mutating pipelines
//! - `postprocess`: launcher shim regeneration and the staged swap
//! - `list`: read-only reporting

pub mod config;
pub mod consts;
pub mod fetch;
pub mod host;
pub mod identity;
pub mod install;
pub mod layout;
pub mod list;
pub mod lock;
pub mod manifest;
pub mod postprocess;
pub mod remove;
pub mod tools;
pub mod update;
pub mod util;

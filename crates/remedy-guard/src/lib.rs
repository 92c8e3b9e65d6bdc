//! Remedy Path Guard
//!
//! Validates untrusted, caller-supplied paths before they are allowed to
//! touch the filesystem.
//!
//! # Core Concepts
//!
//! - [`SafePath`]: a relative path that has passed validation
//! - [`GuardError`]: the rejection taxonomy (empty, absolute, traversal)
//!
//! Every component in the remedy workspace that accepts a path from an
//! untrusted proposer routes it through [`SafePath::validate`] before any
//! filesystem call. [`SafePath::resolve`] is the only sanctioned way to
//! turn such input into an absolute path under a root.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod path;

pub use path::{GuardError, SafePath};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

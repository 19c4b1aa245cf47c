//! # portattr Core
//!
//! The core library for portattr - a portability layer giving Linux, FreeBSD and
//! macOS one API for filesystem extended attributes.
//!
//! ## Overview
//!
//! The three kernels disagree on almost everything around xattrs: Linux encodes
//! the namespace in the name (`user.foo`), FreeBSD passes it as a separate
//! argument, and macOS has no namespaces at all. Buffer sizing also differs in
//! how a too-small buffer is reported. This crate hides those differences:
//!
//! - Callers use *logical* names (`org.myapp.foo`) and a [`Namespace`].
//! - [`names`] turns those into *system* names (`user.org.myapp.foo`) and back.
//! - [`XattrOperations`] runs the probe-then-fetch protocol for variable-length
//!   results on top of any [`NativeXattr`] backend.
//!
//! ## Basic Usage
//!
//! ```rust
//! use portattr_core::{InMemoryBackend, Namespace, XattrFlags, XattrOperations};
//! use std::path::Path;
//!
//! let ops = XattrOperations::new(InMemoryBackend::new());
//! let file = Path::new("/data/report.pdf");
//!
//! ops.set(file, "org.myapp.checksum", b"abc123", XattrFlags::NONE, Namespace::User)?;
//! let value = ops.get(file, "org.myapp.checksum", XattrFlags::NONE, Namespace::User)?;
//! assert_eq!(value, b"abc123");
//! # Ok::<(), portattr_core::XattrError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`types`]: namespaces, flags and operation targets
//! - [`names`]: logical/system name translation
//! - [`namelist`]: parsing of raw kernel name lists
//! - [`traits`]: the native backend contract
//! - [`operations`]: get/set/remove/list with the buffer-sizing protocol
//! - [`memory`]: an in-memory backend for tests and dry runs
//! - [`config`]: tunables for the buffer-sizing protocol
//! - [`error`]: error types preserving native OS codes
//!
//! ## Platform Support
//!
//! Native backends live in separate crates:
//!
//! - `portattr-linux`: the `getxattr` family
//! - `portattr-macos`: the six-argument `getxattr` family
//! - `portattr-freebsd`: the `extattr_*` family

pub mod config;
pub mod error;
pub mod memory;
pub mod namelist;
pub mod names;
pub mod operations;
pub mod traits;
pub mod types;

pub use config::{OperationConfig, TruncationPolicy};
pub use error::{Result, XattrError};
pub use memory::{CallCounts, InMemoryBackend};
pub use names::{bare_name, qualify_bare, to_logical_name, to_system_name, USER_PREFIX};
pub use operations::XattrOperations;
pub use traits::NativeXattr;
pub use types::{Namespace, NativeOp, Target, XattrFlags};

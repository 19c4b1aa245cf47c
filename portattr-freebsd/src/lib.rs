//! FreeBSD backend for portattr, built on `extattr(2)`.
//!
//! FreeBSD takes the namespace as a separate argument
//! (`EXTATTR_NAMESPACE_USER`) and returns name lists length-prefixed rather
//! than NUL-separated. It also truncates silently when a buffer is too small
//! and has no create/replace flags; the backend emulates the Linux behavior
//! for all three.

#[cfg(target_os = "freebsd")]
mod backend;

#[cfg(target_os = "freebsd")]
pub use backend::FreeBsdBackend;

//! Linux backend for portattr, built on the `getxattr(2)` family.
//!
//! Linux encodes the namespace in the attribute name, so qualified system
//! names are passed to the kernel unchanged.

#[cfg(any(target_os = "linux", target_os = "android"))]
mod backend;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use backend::LinuxBackend;

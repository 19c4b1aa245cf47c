//! macOS backend for portattr.
//!
//! macOS has no attribute namespaces: every attribute is effectively a user
//! attribute and names are stored bare. The backend strips the `user.`
//! qualifier on the way in and restores it on listed names, so attributes set
//! by other tools (`com.apple.quarantine`, ...) show up under their real names.

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod backend;

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use backend::MacosBackend;

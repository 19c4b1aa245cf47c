//! # portattr
//!
//! One extended attribute API for Linux, FreeBSD and macOS.
//!
//! The native backend for the build target is picked at compile time; the
//! free functions below run every call through it with the default
//! [`OperationConfig`]. Names are *logical*: pass `org.myapp.tag`, never
//! `user.org.myapp.tag`.
//!
//! ```rust,no_run
//! let path = "/data/report.pdf";
//! portattr::set(path, "org.myapp.reviewed", b"yes")?;
//!
//! for name in portattr::list(path)? {
//!     println!("{} => {:?}", name, portattr::get(path, &name)?);
//! }
//! # Ok::<(), portattr::XattrError>(())
//! ```
//!
//! Errors from the kernel keep their OS code, see [`XattrError::raw_os_error`]
//! and [`XattrError::is_missing_attribute`].

use std::os::fd::AsFd;
use std::path::Path;
use tracing::debug;

pub use portattr_core::{
    to_logical_name, to_system_name, InMemoryBackend, Namespace, NativeOp, NativeXattr,
    OperationConfig, Result, Target, TruncationPolicy, XattrError, XattrFlags, XattrOperations,
    USER_PREFIX,
};

/// The native backend for the build target.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub type PlatformBackend = portattr_linux::LinuxBackend;

/// The native backend for the build target.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub type PlatformBackend = portattr_macos::MacosBackend;

/// The native backend for the build target.
#[cfg(target_os = "freebsd")]
pub type PlatformBackend = portattr_freebsd::FreeBsdBackend;

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
)))]
compile_error!("portattr supports Linux, FreeBSD and macOS only");

/// Operations over the native backend with the default configuration.
pub fn platform() -> XattrOperations<PlatformBackend> {
    platform_with_config(OperationConfig::default())
}

/// Operations over the native backend with a custom configuration.
pub fn platform_with_config(config: OperationConfig) -> XattrOperations<PlatformBackend> {
    debug!("native xattr backend: {}", std::any::type_name::<PlatformBackend>());
    XattrOperations::with_config(PlatformBackend::default(), config)
}

/// Reads attribute `name` of the file at `path`, following symlinks.
pub fn get(path: impl AsRef<Path>, name: &str) -> Result<Vec<u8>> {
    get_with(path, name, XattrFlags::NONE, Namespace::User)
}

pub fn get_with(
    path: impl AsRef<Path>,
    name: &str,
    flags: XattrFlags,
    namespace: Namespace,
) -> Result<Vec<u8>> {
    platform().get(path.as_ref(), name, flags, namespace)
}

/// Reads attribute `name` of an open file.
pub fn get_fd<F: AsFd>(file: &F, name: &str) -> Result<Vec<u8>> {
    platform().get(file.as_fd(), name, XattrFlags::NONE, Namespace::User)
}

/// Sets attribute `name` of the file at `path`, creating or replacing it.
pub fn set(path: impl AsRef<Path>, name: &str, value: &[u8]) -> Result<()> {
    set_with(path, name, value, XattrFlags::NONE, Namespace::User)
}

pub fn set_with(
    path: impl AsRef<Path>,
    name: &str,
    value: &[u8],
    flags: XattrFlags,
    namespace: Namespace,
) -> Result<()> {
    platform().set(path.as_ref(), name, value, flags, namespace)
}

/// Sets attribute `name` of an open file.
pub fn set_fd<F: AsFd>(file: &F, name: &str, value: &[u8]) -> Result<()> {
    platform().set(file.as_fd(), name, value, XattrFlags::NONE, Namespace::User)
}

/// Removes attribute `name` from the file at `path`.
pub fn remove(path: impl AsRef<Path>, name: &str) -> Result<()> {
    remove_with(path, name, XattrFlags::NONE, Namespace::User)
}

pub fn remove_with(
    path: impl AsRef<Path>,
    name: &str,
    flags: XattrFlags,
    namespace: Namespace,
) -> Result<()> {
    platform().remove(path.as_ref(), name, flags, namespace)
}

/// Removes attribute `name` from an open file.
pub fn remove_fd<F: AsFd>(file: &F, name: &str) -> Result<()> {
    platform().remove(file.as_fd(), name, XattrFlags::NONE, Namespace::User)
}

/// Lists the user attribute names of the file at `path`.
pub fn list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    list_with(path, XattrFlags::NONE, Namespace::User)
}

pub fn list_with(
    path: impl AsRef<Path>,
    flags: XattrFlags,
    namespace: Namespace,
) -> Result<Vec<String>> {
    platform().list(path.as_ref(), flags, namespace)
}

/// Lists the user attribute names of an open file.
pub fn list_fd<F: AsFd>(file: &F) -> Result<Vec<String>> {
    platform().list(file.as_fd(), XattrFlags::NONE, Namespace::User)
}

/// Lists every user attribute of `path` together with its value.
///
/// Not a snapshot: an attribute removed between the list and its read fails
/// the whole call.
pub fn list_values(path: impl AsRef<Path>, flags: XattrFlags) -> Result<Vec<(String, Vec<u8>)>> {
    list_values_in(&platform(), Target::Path(path.as_ref()), flags)
}

/// [`list_values`] over any backend.
pub fn list_values_in<B: NativeXattr>(
    ops: &XattrOperations<B>,
    target: Target<'_>,
    flags: XattrFlags,
) -> Result<Vec<(String, Vec<u8>)>> {
    ops.list(target, flags, Namespace::User)?
        .into_iter()
        .map(|name| {
            let value = ops.get(target, &name, flags, Namespace::User)?;
            Ok((name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::NamedTempFile;

    fn xattr_capable_file() -> Option<NamedTempFile> {
        let file = NamedTempFile::new().ok()?;
        set(file.path(), "portattr.probe", b"").ok()?;
        remove(file.path(), "portattr.probe").ok()?;
        Some(file)
    }

    #[test]
    fn test_list_values_in_memory() {
        let ops = XattrOperations::new(InMemoryBackend::new());
        let path = Path::new("/m/file");
        ops.set(path, "a", b"1", XattrFlags::NONE, Namespace::User).unwrap();
        ops.backend().insert_raw(path, "trusted.hidden", b"x");
        ops.set(path, "b", b"", XattrFlags::NONE, Namespace::User).unwrap();

        let pairs = list_values_in(&ops, Target::Path(path), XattrFlags::NONE).unwrap();
        assert_eq!(pairs, vec![("a".to_string(), b"1".to_vec()), ("b".to_string(), Vec::new())]);
    }

    #[test]
    fn test_free_functions() {
        let Some(file) = xattr_capable_file() else { return };
        let path = file.path();

        set(path, "org.portattr.k", b"v").unwrap();
        assert_eq!(get(path, "org.portattr.k").unwrap(), b"v");
        assert!(list(path).unwrap().contains(&"org.portattr.k".to_string()));

        let handle = File::open(path).unwrap();
        set_fd(&handle, "org.portattr.fd", b"w").unwrap();
        assert_eq!(get_fd(&handle, "org.portattr.fd").unwrap(), b"w");
        assert!(list_fd(&handle).unwrap().contains(&"org.portattr.fd".to_string()));
        remove_fd(&handle, "org.portattr.fd").unwrap();

        let pairs = list_values(path, XattrFlags::NONE).unwrap();
        assert!(pairs.contains(&("org.portattr.k".to_string(), b"v".to_vec())));

        remove(path, "org.portattr.k").unwrap();
        let err = get(path, "org.portattr.k").unwrap_err();
        assert!(err.is_missing_attribute());
    }

    #[test]
    fn test_foreign_namespace_rejected() {
        let err = get_with("/", "k", XattrFlags::NONE, Namespace::Security).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }
}

//! Translation between logical attribute names and the namespace-qualified
//! names the kernel stores.
//!
//! A logical name never carries a namespace prefix; callers must not
//! pre-qualify names, since `to_system_name` prefixes unconditionally.

use crate::error::{Result, XattrError};
use crate::types::Namespace;
use std::borrow::Cow;
use std::io;

/// Prefix qualifying a name into the user namespace.
pub const USER_PREFIX: &str = "user.";

pub(crate) fn ensure_supported(namespace: Namespace) -> Result<()> {
    match namespace {
        Namespace::User => Ok(()),
        other => Err(XattrError::invalid(format!("unsupported namespace '{}'", other))),
    }
}

/// Qualifies `logical` into the kernel name for `namespace`.
pub fn to_system_name(namespace: Namespace, logical: &str) -> Result<String> {
    ensure_supported(namespace)?;

    let mut system = String::with_capacity(USER_PREFIX.len() + logical.len());
    system.push_str(USER_PREFIX);
    system.push_str(logical);
    Ok(system)
}

/// Strips the namespace prefix from a kernel name.
///
/// Names outside the user namespace are rejected; `list` relies on this to
/// filter them out.
pub fn to_logical_name(namespace: Namespace, system: &str) -> Result<String> {
    ensure_supported(namespace)?;

    system
        .strip_prefix(USER_PREFIX)
        .map(str::to_owned)
        .ok_or_else(|| XattrError::invalid(format!("'{}' is not in the user namespace", system)))
}

/// Strips the user qualifier for kernels that take the namespace out of band
/// or have none.
///
/// Backends only ever receive names built by [`to_system_name`], so a
/// missing prefix is a caller bug and reported as `EINVAL`.
pub fn bare_name(system: &str) -> io::Result<&str> {
    system
        .strip_prefix(USER_PREFIX)
        .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))
}

/// Inverse of [`bare_name`] for names a kernel listed without qualifier.
pub fn qualify_bare(listed: &str) -> Cow<'_, str> {
    Cow::Owned(format!("{}{}", USER_PREFIX, listed))
}

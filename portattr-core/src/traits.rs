//! The contract every native extended attribute backend implements.
//!
//! Backends are thin: they marshal arguments into one platform's calling
//! convention and report the kernel's answer. Name translation and buffer
//! sizing live in [`crate::operations`].

use crate::types::{Target, XattrFlags};
use std::borrow::Cow;
use std::io;
use std::sync::Arc;

/// Native extended attribute primitives for one platform.
///
/// Names passed in are qualified system names (`user.foo`). A backend whose
/// kernel spells names differently converts them on the way in and undoes it
/// in [`NativeXattr::qualify_listed_name`].
///
/// Errors must be the `io::Error` taken right after the failing call, with
/// the OS code intact.
pub trait NativeXattr: Send + Sync {
    /// Reads an attribute value.
    ///
    /// With `buf == None` this is a size query returning the value length.
    /// Otherwise the value is copied into `buf` and its length returned; a
    /// value longer than `buf` must fail with `ERANGE`.
    fn get(
        &self,
        target: Target<'_>,
        name: &str,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize>;

    /// Writes an attribute value, honoring `flags.create` and `flags.replace`.
    fn set(
        &self,
        target: Target<'_>,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
    ) -> io::Result<()>;

    /// Removes an attribute.
    fn remove(&self, target: Target<'_>, name: &str, flags: XattrFlags) -> io::Result<()>;

    /// Reads the NUL-separated list of attribute names on `target`.
    ///
    /// Same buffer rules as [`NativeXattr::get`].
    fn list(
        &self,
        target: Target<'_>,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize>;

    /// Maps a name as the kernel listed it back to its qualified system name.
    fn qualify_listed_name<'n>(&self, listed: &'n str) -> Cow<'n, str> {
        Cow::Borrowed(listed)
    }
}

impl<T: NativeXattr + ?Sized> NativeXattr for &T {
    fn get(
        &self,
        target: Target<'_>,
        name: &str,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        (**self).get(target, name, buf, flags)
    }

    fn set(
        &self,
        target: Target<'_>,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
    ) -> io::Result<()> {
        (**self).set(target, name, value, flags)
    }

    fn remove(&self, target: Target<'_>, name: &str, flags: XattrFlags) -> io::Result<()> {
        (**self).remove(target, name, flags)
    }

    fn list(
        &self,
        target: Target<'_>,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        (**self).list(target, buf, flags)
    }

    fn qualify_listed_name<'n>(&self, listed: &'n str) -> Cow<'n, str> {
        (**self).qualify_listed_name(listed)
    }
}

impl<T: NativeXattr + ?Sized> NativeXattr for Arc<T> {
    fn get(
        &self,
        target: Target<'_>,
        name: &str,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        (**self).get(target, name, buf, flags)
    }

    fn set(
        &self,
        target: Target<'_>,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
    ) -> io::Result<()> {
        (**self).set(target, name, value, flags)
    }

    fn remove(&self, target: Target<'_>, name: &str, flags: XattrFlags) -> io::Result<()> {
        (**self).remove(target, name, flags)
    }

    fn list(
        &self,
        target: Target<'_>,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        (**self).list(target, buf, flags)
    }

    fn qualify_listed_name<'n>(&self, listed: &'n str) -> Cow<'n, str> {
        (**self).qualify_listed_name(listed)
    }
}

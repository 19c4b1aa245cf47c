//! Error types for portattr.
//!
//! Native failures keep the [`io::Error`] produced right after the failing
//! call, so the raw OS code reaches the caller untouched.

use crate::types::NativeOp;
use std::io;
use thiserror::Error;

/// The code a missing attribute is reported with on this platform.
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub const ENOATTR: i32 = libc::ENOATTR;

/// The code a missing attribute is reported with on this platform.
#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "freebsd")))]
pub const ENOATTR: i32 = libc::ENODATA;

/// Error type for all extended attribute operations.
#[derive(Debug, Error)]
pub enum XattrError {
    /// Unsupported namespace, or a system name outside the expected namespace.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        reason: String,
    },

    /// The native call failed.
    #[error("{op} failed on {target}")]
    Native {
        op: NativeOp,
        target: String,
        #[source]
        source: io::Error,
    },

    /// The attribute kept growing past every buffer sized for it.
    #[error("Attribute '{name}' kept growing between size probe and fetch ({attempts} attempts)")]
    Truncated {
        name: String,
        attempts: u32,
    },
}

impl XattrError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        XattrError::InvalidArgument { reason: reason.into() }
    }

    pub(crate) fn native(op: NativeOp, target: impl ToString, source: io::Error) -> Self {
        XattrError::Native {
            op,
            target: target.to_string(),
            source,
        }
    }

    /// Returns the OS error code this failure corresponds to.
    ///
    /// Native failures return the kernel's code unchanged; the layer's own
    /// failures map to `EINVAL` and `ERANGE`.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            XattrError::InvalidArgument { .. } => Some(libc::EINVAL),
            XattrError::Native { source, .. } => source.raw_os_error(),
            XattrError::Truncated { .. } => Some(libc::ERANGE),
        }
    }

    /// True if the kernel reported that the attribute does not exist.
    pub fn is_missing_attribute(&self) -> bool {
        matches!(self, XattrError::Native { .. }) && self.raw_os_error() == Some(ENOATTR)
    }

    /// True if the filesystem does not support extended attributes.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, XattrError::Native { .. })
            && matches!(
                self.raw_os_error(),
                Some(code) if code == libc::ENOTSUP || code == libc::EOPNOTSUPP
            )
    }

    /// The native operation that failed, if any.
    pub fn op(&self) -> Option<NativeOp> {
        match self {
            XattrError::Native { op, .. } => Some(*op),
            _ => None,
        }
    }
}

impl From<XattrError> for io::Error {
    fn from(err: XattrError) -> Self {
        match err {
            XattrError::Native { source, .. } => source,
            XattrError::InvalidArgument { .. } => io::Error::from_raw_os_error(libc::EINVAL),
            XattrError::Truncated { .. } => io::Error::from_raw_os_error(libc::ERANGE),
        }
    }
}

/// Result type alias for portattr operations.
pub type Result<T> = std::result::Result<T, XattrError>;

//! Common types shared by the translator, the operations and the backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};

/// Attribute namespace a logical name lives in.
///
/// Only [`Namespace::User`] is supported. The other variants name the
/// namespaces the kernels know about so that callers passing them get a clear
/// `InvalidArgument` instead of silently touching the user namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Namespace {
    #[default]
    User,
    System,
    Security,
    Trusted,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::User => "user",
            Namespace::System => "system",
            Namespace::Security => "security",
            Namespace::Trusted => "trusted",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags modifying how an operation treats its target and existing attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XattrFlags {
    /// Operate on a symlink itself instead of the file it points to.
    pub no_follow: bool,
    /// Fail with `EEXIST` if the attribute already exists (set only).
    pub create: bool,
    /// Fail with a missing-attribute error if it does not exist (set only).
    pub replace: bool,
}

impl XattrFlags {
    pub const NONE: XattrFlags = XattrFlags {
        no_follow: false,
        create: false,
        replace: false,
    };

    pub fn no_follow(mut self) -> Self {
        self.no_follow = true;
        self
    }

    pub fn create(mut self) -> Self {
        self.create = true;
        self
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }
}

/// Which native primitive an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    Get,
    Set,
    Remove,
    List,
}

impl NativeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeOp::Get => "get",
            NativeOp::Set => "set",
            NativeOp::Remove => "del",
            NativeOp::List => "list",
        }
    }
}

impl fmt::Display for NativeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The filesystem object an operation acts on.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// A path, resolved by the kernel on every call.
    Path(&'a Path),
    /// An already open file.
    Fd(BorrowedFd<'a>),
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Path(path) => write!(f, "{}", path.display()),
            Target::Fd(fd) => write!(f, "fd {}", fd.as_raw_fd()),
        }
    }
}

impl<'a> From<&'a Path> for Target<'a> {
    fn from(path: &'a Path) -> Self {
        Target::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for Target<'a> {
    fn from(path: &'a PathBuf) -> Self {
        Target::Path(path.as_path())
    }
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(path: &'a str) -> Self {
        Target::Path(Path::new(path))
    }
}

impl<'a> From<&'a File> for Target<'a> {
    fn from(file: &'a File) -> Self {
        Target::Fd(file.as_fd())
    }
}

impl<'a> From<BorrowedFd<'a>> for Target<'a> {
    fn from(fd: BorrowedFd<'a>) -> Self {
        Target::Fd(fd)
    }
}

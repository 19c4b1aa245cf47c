use libc::{c_char, c_int, c_void, ssize_t};
use portattr_core::{bare_name, qualify_bare, NativeXattr, Target, XattrFlags};
use std::borrow::Cow;
use std::ffi::CString;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use tracing::trace;

fn path_cstring(path: &Path) -> io::Result<CString> {
    Ok(CString::new(path.as_os_str().as_bytes())?)
}

fn name_cstring(system: &str) -> io::Result<CString> {
    Ok(CString::new(bare_name(system)?)?)
}

fn cvt(ret: ssize_t) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

fn cvt_unit(ret: c_int) -> io::Result<()> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// `options` argument for a call; `XATTR_NOFOLLOW` only means something for paths.
fn options(target: Target<'_>, flags: XattrFlags) -> c_int {
    match target {
        Target::Path(_) if flags.no_follow => libc::XATTR_NOFOLLOW,
        _ => 0,
    }
}

/// Extended attributes through the macOS `getxattr` family.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacosBackend;

impl MacosBackend {
    pub fn new() -> Self {
        MacosBackend
    }
}

impl NativeXattr for MacosBackend {
    fn get(
        &self,
        target: Target<'_>,
        name: &str,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        let c_name = name_cstring(name)?;
        let (value, size) = match buf {
            Some(buf) => (buf.as_mut_ptr() as *mut c_void, buf.len()),
            None => (ptr::null_mut(), 0),
        };
        let opts = options(target, flags);
        trace!("getxattr {} {} size={} options={:#x}", target, name, size, opts);

        // SAFETY: `value` is null with size 0 or points to `size` writable bytes.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                unsafe { libc::getxattr(c_path.as_ptr(), c_name.as_ptr(), value, size, 0, opts) }
            }
            Target::Fd(fd) => unsafe {
                libc::fgetxattr(fd.as_raw_fd(), c_name.as_ptr(), value, size, 0, opts)
            },
        };
        cvt(ret)
    }

    fn set(
        &self,
        target: Target<'_>,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
    ) -> io::Result<()> {
        let c_name = name_cstring(name)?;
        let data = value.as_ptr() as *const c_void;
        let mut opts = options(target, flags);
        if flags.create {
            opts |= libc::XATTR_CREATE;
        }
        if flags.replace {
            opts |= libc::XATTR_REPLACE;
        }
        trace!("setxattr {} {} len={} options={:#x}", target, name, value.len(), opts);

        // SAFETY: `data` points to `value.len()` readable bytes for the whole call.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                unsafe {
                    libc::setxattr(c_path.as_ptr(), c_name.as_ptr(), data, value.len(), 0, opts)
                }
            }
            Target::Fd(fd) => unsafe {
                libc::fsetxattr(fd.as_raw_fd(), c_name.as_ptr(), data, value.len(), 0, opts)
            },
        };
        cvt_unit(ret)
    }

    fn remove(&self, target: Target<'_>, name: &str, flags: XattrFlags) -> io::Result<()> {
        let c_name = name_cstring(name)?;
        let opts = options(target, flags);
        trace!("removexattr {} {}", target, name);

        // SAFETY: both strings are NUL terminated and outlive the call.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                unsafe { libc::removexattr(c_path.as_ptr(), c_name.as_ptr(), opts) }
            }
            Target::Fd(fd) => unsafe { libc::fremovexattr(fd.as_raw_fd(), c_name.as_ptr(), opts) },
        };
        cvt_unit(ret)
    }

    fn list(
        &self,
        target: Target<'_>,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        let (names, size) = match buf {
            Some(buf) => (buf.as_mut_ptr() as *mut c_char, buf.len()),
            None => (ptr::null_mut(), 0),
        };
        let opts = options(target, flags);
        trace!("listxattr {} size={}", target, size);

        // SAFETY: same buffer contract as in `get`.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                unsafe { libc::listxattr(c_path.as_ptr(), names, size, opts) }
            }
            Target::Fd(fd) => unsafe { libc::flistxattr(fd.as_raw_fd(), names, size, opts) },
        };
        cvt(ret)
    }

    fn qualify_listed_name<'n>(&self, listed: &'n str) -> Cow<'n, str> {
        qualify_bare(listed)
    }
}

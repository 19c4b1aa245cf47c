use libc::{c_char, c_int, c_void, ssize_t};
use portattr_core::{NativeXattr, Target, XattrFlags};
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

fn set_flags(flags: XattrFlags) -> c_int {
    let mut native = 0;
    if flags.create {
        native |= libc::XATTR_CREATE;
    }
    if flags.replace {
        native |= libc::XATTR_REPLACE;
    }
    native
}

/// Extended attributes through `getxattr`, `lgetxattr` and `fgetxattr`
/// (and their set, remove and list siblings).
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxBackend;

impl LinuxBackend {
    pub fn new() -> Self {
        LinuxBackend
    }
}

impl NativeXattr for LinuxBackend {
    fn get(
        &self,
        target: Target<'_>,
        name: &str,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        let c_name = CString::new(name)?;
        let (value, size) = match buf {
            Some(buf) => (buf.as_mut_ptr() as *mut c_void, buf.len()),
            None => (ptr::null_mut(), 0),
        };
        trace!("getxattr {} {} size={}", target, name, size);

        // SAFETY: `value` is either null with size 0 (a size query) or points
        // to a live buffer of exactly `size` bytes; the strings are NUL terminated.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                if flags.no_follow {
                    unsafe { libc::lgetxattr(c_path.as_ptr(), c_name.as_ptr(), value, size) }
                } else {
                    unsafe { libc::getxattr(c_path.as_ptr(), c_name.as_ptr(), value, size) }
                }
            }
            Target::Fd(fd) => unsafe {
                libc::fgetxattr(fd.as_raw_fd(), c_name.as_ptr(), value, size)
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
        let c_name = CString::new(name)?;
        let data = value.as_ptr() as *const c_void;
        let native_flags = set_flags(flags);
        trace!("setxattr {} {} len={} flags={:#x}", target, name, value.len(), native_flags);

        // SAFETY: `data` points to `value.len()` readable bytes for the whole call.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                if flags.no_follow {
                    unsafe {
                        libc::lsetxattr(
                            c_path.as_ptr(),
                            c_name.as_ptr(),
                            data,
                            value.len(),
                            native_flags,
                        )
                    }
                } else {
                    unsafe {
                        libc::setxattr(
                            c_path.as_ptr(),
                            c_name.as_ptr(),
                            data,
                            value.len(),
                            native_flags,
                        )
                    }
                }
            }
            Target::Fd(fd) => unsafe {
                libc::fsetxattr(fd.as_raw_fd(), c_name.as_ptr(), data, value.len(), native_flags)
            },
        };
        cvt_unit(ret)
    }

    fn remove(&self, target: Target<'_>, name: &str, flags: XattrFlags) -> io::Result<()> {
        let c_name = CString::new(name)?;
        trace!("removexattr {} {}", target, name);

        // SAFETY: both strings are NUL terminated and outlive the call.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                if flags.no_follow {
                    unsafe { libc::lremovexattr(c_path.as_ptr(), c_name.as_ptr()) }
                } else {
                    unsafe { libc::removexattr(c_path.as_ptr(), c_name.as_ptr()) }
                }
            }
            Target::Fd(fd) => unsafe { libc::fremovexattr(fd.as_raw_fd(), c_name.as_ptr()) },
        };
        cvt_unit(ret)
    }

    fn list(
        &self,
        target: Target<'_>,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        let (list, size) = match buf {
            Some(buf) => (buf.as_mut_ptr() as *mut c_char, buf.len()),
            None => (ptr::null_mut(), 0),
        };
        trace!("listxattr {} size={}", target, size);

        // SAFETY: same buffer contract as in `get`.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                if flags.no_follow {
                    unsafe { libc::llistxattr(c_path.as_ptr(), list, size) }
                } else {
                    unsafe { libc::listxattr(c_path.as_ptr(), list, size) }
                }
            }
            Target::Fd(fd) => unsafe { libc::flistxattr(fd.as_raw_fd(), list, size) },
        };
        cvt(ret)
    }
}

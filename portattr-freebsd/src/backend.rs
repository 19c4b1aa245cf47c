use libc::{c_int, c_void, ssize_t};
use portattr_core::namelist;
use portattr_core::{bare_name, qualify_bare, NativeXattr, Target, XattrFlags};
use std::borrow::Cow;
use std::ffi::CString;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use tracing::trace;

const NAMESPACE: c_int = libc::EXTATTR_NAMESPACE_USER;

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

fn buffer(buf: Option<&mut [u8]>) -> (*mut c_void, usize) {
    match buf {
        Some(buf) => (buf.as_mut_ptr() as *mut c_void, buf.len()),
        None => (ptr::null_mut(), 0),
    }
}

/// Extended attributes in the `EXTATTR_NAMESPACE_USER` namespace through the
/// `extattr_*_file`, `extattr_*_link` and `extattr_*_fd` calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeBsdBackend;

impl FreeBsdBackend {
    pub fn new() -> Self {
        FreeBsdBackend
    }

    fn get_raw(
        &self,
        target: Target<'_>,
        name: &CString,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        let (data, nbytes) = buffer(buf);

        // SAFETY: `data` is null with nbytes 0 (a size query) or points to
        // `nbytes` writable bytes.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                if flags.no_follow {
                    unsafe {
                        libc::extattr_get_link(
                            c_path.as_ptr(),
                            NAMESPACE,
                            name.as_ptr(),
                            data,
                            nbytes,
                        )
                    }
                } else {
                    unsafe {
                        libc::extattr_get_file(
                            c_path.as_ptr(),
                            NAMESPACE,
                            name.as_ptr(),
                            data,
                            nbytes,
                        )
                    }
                }
            }
            Target::Fd(fd) => unsafe {
                libc::extattr_get_fd(fd.as_raw_fd(), NAMESPACE, name.as_ptr(), data, nbytes)
            },
        };
        cvt(ret)
    }

    fn list_raw(
        &self,
        target: Target<'_>,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        let (data, nbytes) = buffer(buf);

        // SAFETY: same buffer contract as in `get_raw`.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                if flags.no_follow {
                    unsafe { libc::extattr_list_link(c_path.as_ptr(), NAMESPACE, data, nbytes) }
                } else {
                    unsafe { libc::extattr_list_file(c_path.as_ptr(), NAMESPACE, data, nbytes) }
                }
            }
            Target::Fd(fd) => unsafe {
                libc::extattr_list_fd(fd.as_raw_fd(), NAMESPACE, data, nbytes)
            },
        };
        cvt(ret)
    }

    fn exists(&self, target: Target<'_>, name: &CString, flags: XattrFlags) -> io::Result<bool> {
        match self.get_raw(target, name, None, flags) {
            Ok(_) => Ok(true),
            Err(e) if e.raw_os_error() == Some(libc::ENOATTR) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// The kernel truncates silently; a completely filled buffer may have been
/// too small, so ask for the size again and report `ERANGE` if it was.
fn check_filled(
    filled: usize,
    capacity: usize,
    probe: impl FnOnce() -> io::Result<usize>,
) -> io::Result<usize> {
    if filled == capacity && probe()? > capacity {
        return Err(io::Error::from_raw_os_error(libc::ERANGE));
    }
    Ok(filled)
}

impl NativeXattr for FreeBsdBackend {
    fn get(
        &self,
        target: Target<'_>,
        name: &str,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        let c_name = name_cstring(name)?;
        trace!("extattr_get {} {} size={:?}", target, name, buf.as_ref().map(|b| b.len()));

        match buf {
            None => self.get_raw(target, &c_name, None, flags),
            Some(buf) => {
                let capacity = buf.len();
                let filled = self.get_raw(target, &c_name, Some(buf), flags)?;
                check_filled(filled, capacity, || self.get_raw(target, &c_name, None, flags))
            }
        }
    }

    fn set(
        &self,
        target: Target<'_>,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
    ) -> io::Result<()> {
        let c_name = name_cstring(name)?;
        trace!("extattr_set {} {} len={}", target, name, value.len());

        // No native create/replace: check first. Not atomic against other writers.
        if flags.create || flags.replace {
            let exists = self.exists(target, &c_name, flags)?;
            if flags.create && exists {
                return Err(io::Error::from_raw_os_error(libc::EEXIST));
            }
            if flags.replace && !exists {
                return Err(io::Error::from_raw_os_error(libc::ENOATTR));
            }
        }

        let data = value.as_ptr() as *const c_void;
        // SAFETY: `data` points to `value.len()` readable bytes for the whole call.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                if flags.no_follow {
                    unsafe {
                        libc::extattr_set_link(
                            c_path.as_ptr(),
                            NAMESPACE,
                            c_name.as_ptr(),
                            data,
                            value.len(),
                        )
                    }
                } else {
                    unsafe {
                        libc::extattr_set_file(
                            c_path.as_ptr(),
                            NAMESPACE,
                            c_name.as_ptr(),
                            data,
                            value.len(),
                        )
                    }
                }
            }
            Target::Fd(fd) => unsafe {
                libc::extattr_set_fd(fd.as_raw_fd(), NAMESPACE, c_name.as_ptr(), data, value.len())
            },
        };
        cvt(ret).map(drop)
    }

    fn remove(&self, target: Target<'_>, name: &str, flags: XattrFlags) -> io::Result<()> {
        let c_name = name_cstring(name)?;
        trace!("extattr_delete {} {}", target, name);

        // SAFETY: both strings are NUL terminated and outlive the call.
        let ret = match target {
            Target::Path(path) => {
                let c_path = path_cstring(path)?;
                if flags.no_follow {
                    unsafe {
                        libc::extattr_delete_link(c_path.as_ptr(), NAMESPACE, c_name.as_ptr())
                    }
                } else {
                    unsafe {
                        libc::extattr_delete_file(c_path.as_ptr(), NAMESPACE, c_name.as_ptr())
                    }
                }
            }
            Target::Fd(fd) => unsafe {
                libc::extattr_delete_fd(fd.as_raw_fd(), NAMESPACE, c_name.as_ptr())
            },
        };
        cvt(ret as ssize_t).map(drop)
    }

    fn list(
        &self,
        target: Target<'_>,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        trace!("extattr_list {} size={:?}", target, buf.as_ref().map(|b| b.len()));

        match buf {
            None => self.list_raw(target, None, flags),
            Some(buf) => {
                let capacity = buf.len();
                let filled = self.list_raw(target, Some(&mut buf[..]), flags)?;
                let filled = check_filled(filled, capacity, || self.list_raw(target, None, flags))?;
                namelist::length_prefixed_to_nul_separated(&mut buf[..filled]);
                Ok(filled)
            }
        }
    }

    fn qualify_listed_name<'n>(&self, listed: &'n str) -> Cow<'n, str> {
        qualify_bare(listed)
    }
}

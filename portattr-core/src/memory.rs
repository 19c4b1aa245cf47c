//! In-memory extended attribute backend.
//!
//! Behaves like a kernel that supports xattrs on every path: values are
//! stored per target, missing attributes fail with the platform's
//! missing-attribute code, and short buffers fail with `ERANGE`. On top of
//! that it records calls and lets tests inject raw names from foreign
//! namespaces, skew size probes, and force native failures.

use crate::error::ENOATTR;
use crate::namelist;
use crate::traits::NativeXattr;
use crate::types::{NativeOp, Target, XattrFlags};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};

/// Number of native calls made per primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub set: usize,
    pub remove: usize,
    pub list: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.get + self.set + self.remove + self.list
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Path(PathBuf),
    Fd(RawFd),
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<Key, Vec<(String, Vec<u8>)>>,
    fd_aliases: HashMap<RawFd, PathBuf>,
    probe_skew: VecDeque<isize>,
    failures: Vec<(NativeOp, i32)>,
    calls: CallCounts,
    last_flags: Option<XattrFlags>,
}

impl State {
    fn key(&self, target: Target<'_>) -> Key {
        match target {
            Target::Path(path) => Key::Path(path.to_path_buf()),
            Target::Fd(fd) => {
                let raw = fd.as_raw_fd();
                match self.fd_aliases.get(&raw) {
                    Some(path) => Key::Path(path.clone()),
                    None => Key::Fd(raw),
                }
            }
        }
    }

    fn record(&mut self, op: NativeOp, flags: XattrFlags) -> io::Result<()> {
        match op {
            NativeOp::Get => self.calls.get += 1,
            NativeOp::Set => self.calls.set += 1,
            NativeOp::Remove => self.calls.remove += 1,
            NativeOp::List => self.calls.list += 1,
        }
        self.last_flags = Some(flags);

        match self.failures.iter().position(|(failing, _)| *failing == op) {
            Some(idx) => {
                let (_, errno) = self.failures.remove(idx);
                Err(io::Error::from_raw_os_error(errno))
            }
            None => Ok(()),
        }
    }

    fn skewed(&mut self, len: usize) -> usize {
        match self.probe_skew.pop_front() {
            Some(delta) => (len as isize + delta).max(0) as usize,
            None => len,
        }
    }

    fn attrs(&self, key: &Key) -> &[(String, Vec<u8>)] {
        self.objects.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn upsert(&mut self, key: Key, name: &str, value: &[u8]) {
        let attrs = self.objects.entry(key).or_default();
        match attrs.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, slot)) => *slot = value.to_vec(),
            None => attrs.push((name.to_string(), value.to_vec())),
        }
    }
}

fn copy_out(data: &[u8], buf: &mut [u8]) -> io::Result<usize> {
    if buf.len() < data.len() {
        return Err(io::Error::from_raw_os_error(libc::ERANGE));
    }
    buf[..data.len()].copy_from_slice(data);
    Ok(data.len())
}

/// A [`NativeXattr`] backend keeping everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes calls through `fd` act on the attributes of `path`.
    pub fn alias_fd(&self, fd: BorrowedFd<'_>, path: impl Into<PathBuf>) {
        self.state.lock().fd_aliases.insert(fd.as_raw_fd(), path.into());
    }

    /// Stores an attribute under its raw system name, bypassing translation.
    ///
    /// Used to plant attributes from namespaces the public API cannot reach.
    pub fn insert_raw(&self, path: impl AsRef<Path>, system_name: &str, value: &[u8]) {
        let key = Key::Path(path.as_ref().to_path_buf());
        self.state.lock().upsert(key, system_name, value);
    }

    /// Raw system names stored on `path`, in insertion order.
    pub fn raw_names(&self, path: impl AsRef<Path>) -> Vec<String> {
        let key = Key::Path(path.as_ref().to_path_buf());
        let state = self.state.lock();
        state.attrs(&key).iter().map(|(name, _)| name.clone()).collect()
    }

    /// Offsets the next size probe (get or list) by `delta` bytes.
    ///
    /// A negative delta makes the attribute look like it grew after the
    /// probe; a positive one like it shrank.
    pub fn push_probe_skew(&self, delta: isize) {
        self.state.lock().probe_skew.push_back(delta);
    }

    /// Makes the next call of `op` fail with `errno`.
    pub fn fail_next(&self, op: NativeOp, errno: i32) {
        self.state.lock().failures.push((op, errno));
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    /// Flags passed to the most recent native call.
    pub fn last_flags(&self) -> Option<XattrFlags> {
        self.state.lock().last_flags
    }
}

impl NativeXattr for InMemoryBackend {
    fn get(
        &self,
        target: Target<'_>,
        name: &str,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.record(NativeOp::Get, flags)?;

        let key = state.key(target);
        let value = state
            .attrs(&key)
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| io::Error::from_raw_os_error(ENOATTR))?;

        match buf {
            None => Ok(state.skewed(value.len())),
            Some(buf) => copy_out(&value, buf),
        }
    }

    fn set(
        &self,
        target: Target<'_>,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
    ) -> io::Result<()> {
        let mut state = self.state.lock();
        state.record(NativeOp::Set, flags)?;

        let key = state.key(target);
        let exists = state.attrs(&key).iter().any(|(existing, _)| existing == name);
        if flags.create && exists {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }
        if flags.replace && !exists {
            return Err(io::Error::from_raw_os_error(ENOATTR));
        }

        state.upsert(key, name, value);
        Ok(())
    }

    fn remove(&self, target: Target<'_>, name: &str, flags: XattrFlags) -> io::Result<()> {
        let mut state = self.state.lock();
        state.record(NativeOp::Remove, flags)?;

        let key = state.key(target);
        let attrs = state
            .objects
            .get_mut(&key)
            .ok_or_else(|| io::Error::from_raw_os_error(ENOATTR))?;
        let idx = attrs
            .iter()
            .position(|(existing, _)| existing == name)
            .ok_or_else(|| io::Error::from_raw_os_error(ENOATTR))?;
        attrs.remove(idx);
        Ok(())
    }

    fn list(
        &self,
        target: Target<'_>,
        buf: Option<&mut [u8]>,
        flags: XattrFlags,
    ) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.record(NativeOp::List, flags)?;

        let key = state.key(target);
        let raw = namelist::join(state.attrs(&key).iter().map(|(name, _)| name.as_bytes()));

        match buf {
            None => Ok(state.skewed(raw.len())),
            Some(buf) => copy_out(&raw, buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::os::fd::AsFd;

    #[test]
    fn test_probe_and_fetch() {
        let backend = InMemoryBackend::new();
        let path = Path::new("/m/file");
        backend.set(Target::Path(path), "user.k", b"value", XattrFlags::NONE).unwrap();

        assert_eq!(backend.get(Target::Path(path), "user.k", None, XattrFlags::NONE).unwrap(), 5);

        let mut small = [0u8; 2];
        let err = backend
            .get(Target::Path(path), "user.k", Some(&mut small), XattrFlags::NONE)
            .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ERANGE));

        let mut buf = [0u8; 8];
        let n = backend
            .get(Target::Path(path), "user.k", Some(&mut buf), XattrFlags::NONE)
            .unwrap();
        assert_eq!(&buf[..n], b"value");
        assert_eq!(backend.calls().get, 3);
    }

    #[test]
    fn test_create_and_replace() {
        let backend = InMemoryBackend::new();
        let target = Target::from("/m/file");

        let err = backend.set(target, "user.k", b"v", XattrFlags::NONE.replace()).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ENOATTR));

        backend.set(target, "user.k", b"v", XattrFlags::NONE.create()).unwrap();
        let err = backend.set(target, "user.k", b"w", XattrFlags::NONE.create()).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EEXIST));

        backend.set(target, "user.k", b"w", XattrFlags::NONE.replace()).unwrap();
        assert_eq!(backend.raw_names("/m/file"), vec!["user.k".to_string()]);
    }

    #[test]
    fn test_list_keeps_insertion_order() {
        let backend = InMemoryBackend::new();
        backend.insert_raw("/m/file", "user.b", b"");
        backend.insert_raw("/m/file", "system.a", b"");
        backend.insert_raw("/m/file", "user.b", b"again");

        let mut buf = [0u8; 64];
        let n = backend.list(Target::from("/m/file"), Some(&mut buf), XattrFlags::NONE).unwrap();
        assert_eq!(&buf[..n], b"user.b\0system.a\0");
    }

    #[test]
    fn test_probe_skew_and_injected_failure() {
        let backend = InMemoryBackend::new();
        backend.insert_raw("/m/file", "user.k", b"abcdef");
        backend.push_probe_skew(-4);
        backend.push_probe_skew(-100);

        let target = Target::from("/m/file");
        assert_eq!(backend.get(target, "user.k", None, XattrFlags::NONE).unwrap(), 2);
        assert_eq!(backend.get(target, "user.k", None, XattrFlags::NONE).unwrap(), 0);
        assert_eq!(backend.get(target, "user.k", None, XattrFlags::NONE).unwrap(), 6);

        backend.fail_next(NativeOp::Remove, libc::EACCES);
        let err = backend.remove(target, "user.k", XattrFlags::NONE).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EACCES));
        backend.remove(target, "user.k", XattrFlags::NONE).unwrap();
    }

    #[test]
    fn test_fd_alias() {
        let backend = InMemoryBackend::new();
        let file = File::open("/dev/null").unwrap();
        backend.alias_fd(file.as_fd(), "/m/file");

        backend.set(Target::from(&file), "user.k", b"v", XattrFlags::NONE.no_follow()).unwrap();
        assert_eq!(backend.raw_names("/m/file"), vec!["user.k".to_string()]);
        assert_eq!(backend.last_flags(), Some(XattrFlags::NONE.no_follow()));
    }
}

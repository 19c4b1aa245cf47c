//! Extended attribute operations on top of a [`NativeXattr`] backend.
//!
//! Get and list return data of unknown length, so both run a probe-then-fetch
//! cycle: a size query, an allocation of the probed size plus some slack, and
//! the real fetch into the probed part of that buffer. Between the two calls
//! another process may change the attribute:
//!
//! - a shrink is harmless, the fetch reports fewer bytes;
//! - a grow makes the fetch fail with `ERANGE` (or report more bytes than
//!   were requested), and the whole cycle is repeated as the configured
//!   [`TruncationPolicy`](crate::TruncationPolicy) allows.

use crate::config::OperationConfig;
use crate::error::{Result, XattrError};
use crate::namelist;
use crate::names::{ensure_supported, to_logical_name, to_system_name};
use crate::traits::NativeXattr;
use crate::types::{Namespace, NativeOp, Target, XattrFlags};
use std::io;
use tracing::{debug, trace, warn};

enum Fetch {
    Done(Vec<u8>),
    Grew,
}

/// Uniform get/set/remove/list over one native backend.
#[derive(Debug, Clone, Default)]
pub struct XattrOperations<B> {
    backend: B,
    config: OperationConfig,
}

impl<B: NativeXattr> XattrOperations<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, OperationConfig::default())
    }

    pub fn with_config(backend: B, config: OperationConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &OperationConfig {
        &self.config
    }

    /// Reads the value of `name`.
    ///
    /// A zero-length attribute yields an empty vector.
    pub fn get<'t>(
        &self,
        target: impl Into<Target<'t>>,
        name: &str,
        flags: XattrFlags,
        namespace: Namespace,
    ) -> Result<Vec<u8>> {
        let target = target.into();
        let system = to_system_name(namespace, name)?;

        let value = self.fetch_sized(NativeOp::Get, target, &system, |buf| {
            self.backend.get(target, &system, buf, flags)
        })?;

        debug!("get {} on {}: {} bytes", system, target, value.len());
        Ok(value)
    }

    /// Writes `value` as the value of `name`.
    pub fn set<'t>(
        &self,
        target: impl Into<Target<'t>>,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
        namespace: Namespace,
    ) -> Result<()> {
        let target = target.into();
        let system = to_system_name(namespace, name)?;

        debug!("set {} on {}: {} bytes", system, target, value.len());
        self.backend
            .set(target, &system, value, flags)
            .map_err(|e| XattrError::native(NativeOp::Set, target, e))
    }

    /// Removes `name`.
    pub fn remove<'t>(
        &self,
        target: impl Into<Target<'t>>,
        name: &str,
        flags: XattrFlags,
        namespace: Namespace,
    ) -> Result<()> {
        let target = target.into();
        let system = to_system_name(namespace, name)?;

        debug!("remove {} on {}", system, target);
        self.backend
            .remove(target, &system, flags)
            .map_err(|e| XattrError::native(NativeOp::Remove, target, e))
    }

    /// Lists the logical names of all attributes in `namespace`.
    ///
    /// Attributes from other namespaces are skipped, as are names that are
    /// not valid UTF-8. Names come back in the order the kernel reports them.
    pub fn list<'t>(
        &self,
        target: impl Into<Target<'t>>,
        flags: XattrFlags,
        namespace: Namespace,
    ) -> Result<Vec<String>> {
        let target = target.into();
        ensure_supported(namespace)?;

        let raw = self.fetch_sized(NativeOp::List, target, "<name list>", |buf| {
            self.backend.list(target, buf, flags)
        })?;

        let mut names = Vec::new();
        for listed in namelist::split(&raw) {
            let Ok(listed) = std::str::from_utf8(listed) else {
                trace!("skipping non UTF-8 attribute name on {}", target);
                continue;
            };
            let system = self.backend.qualify_listed_name(listed);
            match to_logical_name(namespace, &system) {
                Ok(logical) => names.push(logical),
                Err(_) => trace!("skipping foreign attribute {} on {}", system, target),
            }
        }

        debug!("list on {}: {} raw bytes, {} names kept", target, raw.len(), names.len());
        Ok(names)
    }

    /// Runs probe/fetch cycles until one completes or the policy gives up.
    fn fetch_sized<F>(
        &self,
        op: NativeOp,
        target: Target<'_>,
        what: &str,
        mut call: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(Option<&mut [u8]>) -> io::Result<usize>,
    {
        let attempts = self.config.truncation.max_attempts();

        for attempt in 1..=attempts {
            let fetched = self
                .fetch_once(&mut call)
                .map_err(|e| XattrError::native(op, target, e))?;
            match fetched {
                Fetch::Done(data) => return Ok(data),
                Fetch::Grew => {
                    warn!(
                        "{} on {} grew during fetch (attempt {} of {})",
                        what, target, attempt, attempts
                    );
                }
            }
        }

        Err(XattrError::Truncated {
            name: what.to_string(),
            attempts,
        })
    }

    fn fetch_once<F>(&self, call: &mut F) -> io::Result<Fetch>
    where
        F: FnMut(Option<&mut [u8]>) -> io::Result<usize>,
    {
        let probed = call(None)?;
        let mut buf = allocate(probed, self.config.slack)?;
        trace!("probed {} bytes, allocated {}", probed, buf.len());

        match call(Some(&mut buf[..probed])) {
            Ok(fetched) if fetched > probed => Ok(Fetch::Grew),
            Ok(fetched) => {
                buf.truncate(fetched);
                Ok(Fetch::Done(buf))
            }
            Err(e) if e.raw_os_error() == Some(libc::ERANGE) => Ok(Fetch::Grew),
            Err(e) => Err(e),
        }
    }
}

/// Zeroed buffer of `probed + slack` bytes. A size that overflows or cannot
/// be allocated fails with `ENOMEM` instead of aborting.
fn allocate(probed: usize, slack: usize) -> io::Result<Vec<u8>> {
    let enomem = || io::Error::from_raw_os_error(libc::ENOMEM);
    let len = probed.checked_add(slack).ok_or_else(enomem)?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| enomem())?;
    buf.resize(len, 0);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TruncationPolicy;
    use crate::error::ENOATTR;
    use crate::memory::InMemoryBackend;
    use std::fs::File;
    use std::os::fd::AsFd;
    use std::path::Path;

    const FILE: &str = "/srv/data/file";

    fn ops() -> XattrOperations<InMemoryBackend> {
        XattrOperations::new(InMemoryBackend::new())
    }

    fn get(ops: &XattrOperations<InMemoryBackend>, name: &str) -> Result<Vec<u8>> {
        ops.get(FILE, name, XattrFlags::NONE, Namespace::User)
    }

    fn list(ops: &XattrOperations<InMemoryBackend>) -> Result<Vec<String>> {
        ops.list(FILE, XattrFlags::NONE, Namespace::User)
    }

    #[test]
    fn test_set_then_get() {
        let ops = ops();
        for value in [&b"v"[..], &b""[..], &b"a\0b\0\0c"[..]] {
            ops.set(FILE, "k", value, XattrFlags::NONE, Namespace::User).unwrap();
            assert_eq!(get(&ops, "k").unwrap(), value);
        }
        assert_eq!(ops.backend().raw_names(FILE), vec!["user.k".to_string()]);
    }

    #[test]
    fn test_delete_removes_from_list() {
        let ops = ops();
        ops.set(FILE, "k", b"v", XattrFlags::NONE, Namespace::User).unwrap();
        assert_eq!(list(&ops).unwrap(), vec!["k".to_string()]);

        ops.remove(FILE, "k", XattrFlags::NONE, Namespace::User).unwrap();
        assert!(list(&ops).unwrap().is_empty());

        let err = get(&ops, "k").unwrap_err();
        assert!(err.is_missing_attribute());
        assert_eq!(err.op(), Some(NativeOp::Get));
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(list(&ops()).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_list_excludes_foreign_namespaces() {
        let ops = ops();
        ops.set(FILE, "org.myapp.tag", b"blue", XattrFlags::NONE, Namespace::User).unwrap();
        ops.backend().insert_raw(FILE, "system.posix_acl_access", b"\x02\x00");
        ops.backend().insert_raw(FILE, "security.selinux", b"unconfined_u");
        ops.set(FILE, "second", b"", XattrFlags::NONE, Namespace::User).unwrap();

        assert_eq!(
            list(&ops).unwrap(),
            vec!["org.myapp.tag".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_non_user_namespace_never_reaches_backend() {
        let ops = ops();
        for namespace in [Namespace::System, Namespace::Security, Namespace::Trusted] {
            let results = [
                ops.get(FILE, "k", XattrFlags::NONE, namespace).map(drop),
                ops.set(FILE, "k", b"v", XattrFlags::NONE, namespace),
                ops.remove(FILE, "k", XattrFlags::NONE, namespace),
                ops.list(FILE, XattrFlags::NONE, namespace).map(drop),
            ];
            for result in results {
                let err = result.unwrap_err();
                assert!(matches!(err, XattrError::InvalidArgument { .. }));
                assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
            }
        }
        assert_eq!(ops.backend().calls().total(), 0);
    }

    #[test]
    fn test_large_value_with_varying_probes() {
        let ops = ops();
        let value: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        ops.set(FILE, "big", &value, XattrFlags::NONE, Namespace::User).unwrap();

        // Exact probe.
        assert_eq!(get(&ops, "big").unwrap(), value);

        // Probe larger than the value: the fetch reports fewer bytes.
        ops.backend().push_probe_skew(4096);
        assert_eq!(get(&ops, "big").unwrap(), value);

        // Probe within the slack margin still needs a second cycle, since only
        // the probed part of the buffer is offered to the kernel.
        ops.backend().push_probe_skew(-1);
        assert_eq!(get(&ops, "big").unwrap(), value);

        // Probe far too small on the first cycle only.
        ops.backend().push_probe_skew(-50_000);
        let before = ops.backend().calls().get;
        assert_eq!(get(&ops, "big").unwrap(), value);
        assert_eq!(ops.backend().calls().get - before, 4);
    }

    #[test]
    fn test_persistent_growth_is_truncation() {
        let ops = ops();
        ops.set(FILE, "k", b"growing", XattrFlags::NONE, Namespace::User).unwrap();
        ops.backend().push_probe_skew(-3);
        ops.backend().push_probe_skew(-3);

        let err = get(&ops, "k").unwrap_err();
        match err {
            XattrError::Truncated { ref name, attempts } => {
                assert_eq!(name, "user.k");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.raw_os_error(), Some(libc::ERANGE));
    }

    #[test]
    fn test_fail_policy_does_not_retry() {
        let backend = InMemoryBackend::new();
        let config = OperationConfig::new().with_truncation(TruncationPolicy::Fail);
        let ops = XattrOperations::with_config(backend, config);
        ops.set(FILE, "k", b"value", XattrFlags::NONE, Namespace::User).unwrap();
        ops.backend().push_probe_skew(-1);

        let err = get(&ops, "k").unwrap_err();
        assert!(matches!(err, XattrError::Truncated { attempts: 1, .. }));
        assert_eq!(ops.backend().calls().get, 2);

        // Nothing left in the skew queue: the next read is clean.
        assert_eq!(get(&ops, "k").unwrap(), b"value");
    }

    #[test]
    fn test_list_retries_on_growth() {
        let ops = ops();
        ops.set(FILE, "a", b"1", XattrFlags::NONE, Namespace::User).unwrap();
        ops.set(FILE, "b", b"2", XattrFlags::NONE, Namespace::User).unwrap();
        ops.backend().push_probe_skew(-7);

        assert_eq!(list(&ops).unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ops.backend().calls().list, 4);
    }

    #[test]
    fn test_list_with_larger_probe() {
        let ops = ops();
        ops.set(FILE, "a", b"1", XattrFlags::NONE, Namespace::User).unwrap();
        ops.backend().push_probe_skew(32);
        assert_eq!(list(&ops).unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_native_errors_are_preserved() {
        let ops = ops();
        ops.backend().fail_next(NativeOp::Get, libc::ENOTSUP);
        let err = get(&ops, "k").unwrap_err();
        assert!(err.is_unsupported());

        ops.backend().fail_next(NativeOp::Set, libc::ENOSPC);
        let err = ops.set(FILE, "k", b"v", XattrFlags::NONE, Namespace::User).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOSPC));
        assert_eq!(err.op(), Some(NativeOp::Set));

        ops.backend().fail_next(NativeOp::List, libc::EACCES);
        let err = list(&ops).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EACCES));

        let err = ops.remove(FILE, "absent", XattrFlags::NONE, Namespace::User).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ENOATTR));
        assert_eq!(err.op(), Some(NativeOp::Remove));
    }

    #[test]
    fn test_oversized_slack_is_an_error() {
        for slack in [usize::MAX, isize::MAX as usize] {
            let config = OperationConfig::new().with_slack(slack);
            let ops = XattrOperations::with_config(InMemoryBackend::new(), config);
            ops.set(FILE, "k", b"value", XattrFlags::NONE, Namespace::User).unwrap();

            let err = get(&ops, "k").unwrap_err();
            assert_eq!(err.raw_os_error(), Some(libc::ENOMEM));
            assert_eq!(err.op(), Some(NativeOp::Get));

            let err = list(&ops).unwrap_err();
            assert_eq!(err.raw_os_error(), Some(libc::ENOMEM));
            assert_eq!(err.op(), Some(NativeOp::List));
        }
    }

    #[test]
    fn test_flags_reach_backend() {
        let ops = ops();
        ops.set(FILE, "k", b"v", XattrFlags::NONE.create(), Namespace::User).unwrap();
        assert_eq!(ops.backend().last_flags(), Some(XattrFlags::NONE.create()));

        let err = ops.set(FILE, "k", b"w", XattrFlags::NONE.create(), Namespace::User).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EEXIST));

        let err = ops
            .set(FILE, "other", b"w", XattrFlags::NONE.replace(), Namespace::User)
            .unwrap_err();
        assert!(err.is_missing_attribute());

        ops.list(FILE, XattrFlags::NONE.no_follow(), Namespace::User).unwrap();
        assert_eq!(ops.backend().last_flags(), Some(XattrFlags::NONE.no_follow()));
    }

    #[test]
    fn test_fd_target() {
        let ops = ops();
        let file = File::open("/dev/null").unwrap();
        ops.backend().alias_fd(file.as_fd(), FILE);

        ops.set(&file, "via.fd", b"x", XattrFlags::NONE, Namespace::User).unwrap();
        assert_eq!(get(&ops, "via.fd").unwrap(), b"x");
        let names = ops.list(&file, XattrFlags::NONE, Namespace::User).unwrap();
        assert_eq!(names, vec!["via.fd".to_string()]);
        ops.remove(&file, "via.fd", XattrFlags::NONE, Namespace::User).unwrap();
        assert!(list(&ops).unwrap().is_empty());
    }

    #[test]
    fn test_empty_logical_name() {
        let ops = ops();
        ops.set(Path::new(FILE), "", b"anonymous", XattrFlags::NONE, Namespace::User).unwrap();
        assert_eq!(ops.backend().raw_names(FILE), vec!["user.".to_string()]);
        assert_eq!(list(&ops).unwrap(), vec![String::new()]);
    }
}

//! Raw attribute name lists as returned by the kernels.
//!
//! Linux and macOS return names as consecutive NUL-terminated strings.
//! FreeBSD prefixes each name with a one-byte length instead; backends convert
//! that form in place before handing the buffer to the operations layer.

/// Iterates the names in a NUL-separated list.
///
/// Empty segments are skipped and a final segment without a terminator is
/// still yielded.
pub fn split(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    raw.split(|byte| *byte == 0).filter(|name| !name.is_empty())
}

/// Encodes names as a NUL-separated list.
pub fn join<'a, I>(names: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut raw = Vec::new();
    for name in names {
        raw.extend_from_slice(name);
        raw.push(0);
    }
    raw
}

/// Rewrites a length-prefixed list into the NUL-separated form, in place.
///
/// Both encodings spend exactly one byte per name, so the length is unchanged.
/// A record whose declared length runs past the end is clamped to what is
/// there.
pub fn length_prefixed_to_nul_separated(buf: &mut [u8]) {
    let mut pos = 0;
    while pos < buf.len() {
        let len = (buf[pos] as usize).min(buf.len() - pos - 1);
        buf.copy_within(pos + 1..pos + 1 + len, pos);
        buf[pos + len] = 0;
        pos += len + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[u8]) -> Vec<&[u8]> {
        split(raw).collect()
    }

    #[test]
    fn test_split() {
        assert_eq!(names(b"user.a\0user.bb\0"), vec![&b"user.a"[..], &b"user.bb"[..]]);
        assert!(names(b"").is_empty());
        assert!(names(b"\0\0").is_empty());
    }

    #[test]
    fn test_split_unterminated_tail() {
        assert_eq!(names(b"user.a\0user.b"), vec![&b"user.a"[..], &b"user.b"[..]]);
    }

    #[test]
    fn test_join() {
        let raw = join([&b"user.x"[..], &b"system.y"[..]]);
        assert_eq!(raw, b"user.x\0system.y\0");
    }

    #[test]
    fn test_length_prefixed_conversion() {
        let mut buf = b"\x03foo\x05hello\x01z".to_vec();
        length_prefixed_to_nul_separated(&mut buf);
        assert_eq!(buf, b"foo\0hello\0z\0");
    }

    #[test]
    fn test_length_prefixed_truncated_record() {
        let mut buf = b"\x02ab\x09cd".to_vec();
        length_prefixed_to_nul_separated(&mut buf);
        assert_eq!(names(&buf), vec![&b"ab"[..], &b"cd"[..]]);
    }

    #[test]
    fn test_length_prefixed_empty() {
        let mut buf: Vec<u8> = Vec::new();
        length_prefixed_to_nul_separated(&mut buf);
        assert!(buf.is_empty());
    }
}

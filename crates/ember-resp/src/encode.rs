//! Reply serializers. Every function appends the exact wire bytes of one
//! reply onto a caller-supplied buffer, typically a connection's outbound
//! queue.

use std::io::Write;

/// `+<s>\r\n`. `s` must not contain CR or LF; replies built here are fixed
/// literals, so the caller guarantees that.
pub fn simple_string(out: &mut Vec<u8>, s: &str) {
    debug_assert!(!s.bytes().any(|b| b == b'\r' || b == b'\n'));
    out.push(b'+');
    out.extend_from_slice(s.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// `-<msg>\r\n`. Same CR/LF restriction as [`simple_string`].
pub fn error(out: &mut Vec<u8>, msg: &str) {
    debug_assert!(!msg.bytes().any(|b| b == b'\r' || b == b'\n'));
    out.push(b'-');
    out.extend_from_slice(msg.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// `:<n>\r\n`
pub fn integer(out: &mut Vec<u8>, n: i64) {
    // Writes to a Vec cannot fail.
    let _ = write!(out, ":{n}\r\n");
}

/// `$<len>\r\n<bytes>\r\n`, or the null bulk `$-1\r\n` for `None`.
pub fn bulk_string(out: &mut Vec<u8>, bytes: Option<&[u8]>) {
    match bytes {
        Some(bytes) => {
            let _ = write!(out, "${}\r\n", bytes.len());
            out.extend_from_slice(bytes);
            out.extend_from_slice(b"\r\n");
        }
        None => out.extend_from_slice(b"$-1\r\n"),
    }
}

/// `*<n>\r\n` alone. `0` is the empty array, `-1` the null array.
pub fn array_header(out: &mut Vec<u8>, n: i64) {
    let _ = write!(out, "*{n}\r\n");
}

/// A whole array of bulk strings.
pub fn array<'a, I>(out: &mut Vec<u8>, items: I)
where
    I: IntoIterator<Item = &'a [u8]>,
    I::IntoIter: ExactSizeIterator,
{
    let items = items.into_iter();
    array_header(out, items.len() as i64);
    for item in items {
        bulk_string(out, Some(item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(f: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        let mut out = Vec::new();
        f(&mut out);
        out
    }

    #[test]
    fn simple_and_error_replies() {
        assert_eq!(collect(|out| simple_string(out, "OK")), b"+OK\r\n");
        assert_eq!(collect(|out| simple_string(out, "PONG")), b"+PONG\r\n");
        assert_eq!(collect(|out| error(out, "ERR unknown command")), b"-ERR unknown command\r\n");
    }

    #[test]
    fn integers() {
        assert_eq!(collect(|out| integer(out, 0)), b":0\r\n");
        assert_eq!(collect(|out| integer(out, 42)), b":42\r\n");
        assert_eq!(collect(|out| integer(out, -7)), b":-7\r\n");
    }

    #[test]
    fn bulk_strings() {
        assert_eq!(collect(|out| bulk_string(out, Some(b"v"))), b"$1\r\nv\r\n");
        assert_eq!(collect(|out| bulk_string(out, Some(b""))), b"$0\r\n\r\n");
        assert_eq!(collect(|out| bulk_string(out, Some(b"a\r\nb"))), b"$4\r\na\r\nb\r\n");
        assert_eq!(collect(|out| bulk_string(out, None)), b"$-1\r\n");
    }

    #[test]
    fn arrays() {
        let items: Vec<&[u8]> = vec![b"a", b"bc"];
        assert_eq!(collect(|out| array(out, items)), b"*2\r\n$1\r\na\r\n$2\r\nbc\r\n");
        assert_eq!(collect(|out| array_header(out, 0)), b"*0\r\n");
        assert_eq!(collect(|out| array_header(out, -1)), b"*-1\r\n");
    }

    #[test]
    fn replies_concatenate_in_call_order() {
        let mut out = Vec::new();
        simple_string(&mut out, "OK");
        integer(&mut out, 2);
        bulk_string(&mut out, None);
        assert_eq!(out, b"+OK\r\n:2\r\n$-1\r\n");
    }
}

//! C1 — query parameter values.
//!
//! A parameter is immutable bytes plus a text/binary flag. Numeric
//! parameters are normalized to network (big-endian) byte order at
//! construction time so the wire driver never has to think about host
//! endianness.

use std::sync::Arc;

/// Ownership mode of a parameter's bytes.
///
/// The C++ original tracked `owned: bool` against a raw pointer that could
/// dangle past the source's lifetime when "borrowed". `Arc<[u8]>` gives the
/// same two ownership states (the destination ends up in the source's
/// ownership state on clone, exactly as spec.md's copy-assignment rule
/// requires) without the soundness hole.
#[derive(Debug, Clone)]
enum Bytes {
    Owned(Vec<u8>),
    Borrowed(Arc<[u8]>),
}

impl Bytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            Bytes::Owned(v) => v.as_slice(),
            Bytes::Borrowed(a) => a.as_ref(),
        }
    }
}

/// A single bound query parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    data: Bytes,
    binary: bool,
}

impl Parameter {
    /// Raw bytes, in wire order.
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.data.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if these bytes are the binary wire format rather than text.
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// A NUL-terminated text parameter, per the textual wire protocol.
    pub fn text(s: impl AsRef<str>) -> Self {
        let mut bytes = s.as_ref().as_bytes().to_vec();
        bytes.push(0);
        Parameter {
            data: Bytes::Owned(bytes),
            binary: false,
        }
    }

    /// `"t"` / `"f"`, NUL-terminated, as libpq's boolean text form expects.
    pub fn boolean(value: bool) -> Self {
        Parameter::text(if value { "t" } else { "f" })
    }

    /// A raw binary parameter. `bytes` is copied and byte-reversed on a
    /// little-endian host so the wire form is always big-endian.
    pub fn number(bytes: &[u8]) -> Self {
        let mut copy = bytes.to_vec();
        if cfg!(target_endian = "little") {
            copy.reverse();
        }
        Parameter {
            data: Bytes::Owned(copy),
            binary: true,
        }
    }

    pub fn int16(v: i16) -> Self {
        Parameter::number(&v.to_ne_bytes())
    }

    pub fn int32(v: i32) -> Self {
        Parameter::number(&v.to_ne_bytes())
    }

    pub fn int64(v: i64) -> Self {
        Parameter::number(&v.to_ne_bytes())
    }

    pub fn uint16(v: u16) -> Self {
        Parameter::number(&v.to_ne_bytes())
    }

    pub fn uint32(v: u32) -> Self {
        Parameter::number(&v.to_ne_bytes())
    }

    pub fn uint64(v: u64) -> Self {
        Parameter::number(&v.to_ne_bytes())
    }

    /// Wraps an externally-owned buffer without copying it. The parameter
    /// shares ownership of `bytes` via `Arc` rather than aliasing a bare
    /// pointer — see the module doc for why.
    pub fn borrowed(bytes: Arc<[u8]>, binary: bool) -> Self {
        Parameter {
            data: Bytes::Borrowed(bytes),
            binary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_int16() {
        assert_eq!(Parameter::int16(0x0102).data(), &[0x01, 0x02]);
    }

    #[test]
    fn big_endian_int32() {
        assert_eq!(Parameter::int32(0x0102_0304).data(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn big_endian_int64() {
        assert_eq!(
            Parameter::int64(0x0102_0304_0506_0708).data(),
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn text_has_trailing_nul() {
        let p = Parameter::text("abc");
        assert_eq!(p.data(), b"abc\0");
        assert_eq!(p.len(), 4);
        assert!(!p.is_binary());
    }

    #[test]
    fn boolean_text_form() {
        assert_eq!(Parameter::boolean(true).data(), b"t\0");
        assert_eq!(Parameter::boolean(false).data(), b"f\0");
    }

    #[test]
    fn clone_preserves_ownership_state() {
        let owned = Parameter::text("x");
        let cloned = owned.clone();
        assert_eq!(owned.data(), cloned.data());

        let shared: Arc<[u8]> = Arc::from(&b"y"[..]);
        let borrowed = Parameter::borrowed(shared.clone(), false);
        let borrowed_clone = borrowed.clone();
        assert_eq!(borrowed_clone.data(), shared.as_ref());
    }
}

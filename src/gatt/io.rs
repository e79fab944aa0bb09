use structbuf::StructBuf;

use crate::att::{ErrorCode, Handle};

/// I/O callback result type.
pub type IoResult = std::result::Result<(), ErrorCode>;

/// Default ATT MTU ([Vol 3] Part F, Section 3.2.8).
pub const DEFAULT_MTU: u16 = 23;

/// Characteristic or descriptor read request.
#[derive(Debug)]
pub struct ReadReq {
    hdl: Handle,
    off: u16,
    buf: StructBuf,
}

impl ReadReq {
    /// Creates a read request. The response is limited to `mtu - 1` bytes
    /// (`ATT_READ_RSP` and `ATT_READ_BLOB_RSP` opcode overhead).
    #[inline]
    #[must_use]
    pub fn new(hdl: Handle, off: u16, mtu: u16) -> Self {
        Self {
            hdl,
            off,
            buf: StructBuf::new(usize::from(mtu.max(DEFAULT_MTU) - 1)),
        }
    }

    /// Returns the attribute handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.hdl
    }

    /// Returns the value offset.
    #[inline(always)]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.off as _
    }

    /// Provides the complete attribute value with automatic offset and MTU
    /// handling. An offset equal to the value length produces an empty
    /// response.
    #[inline]
    pub fn complete(&mut self, v: impl AsRef<[u8]>) -> IoResult {
        self.partial((v.as_ref().get(self.offset()..)).ok_or(ErrorCode::InvalidOffset)?)
    }

    /// Provides the attribute value starting at the requested offset. The value
    /// is truncated to fit within the MTU.
    #[inline]
    pub fn partial(&mut self, v: impl AsRef<[u8]>) -> IoResult {
        let v = v.as_ref();
        self.buf.clear();
        self.buf.put_at(0, &v[..v.len().min(self.buf.lim())]);
        Ok(())
    }

    /// Returns the response value.
    #[inline(always)]
    #[must_use]
    pub fn value(&self) -> &[u8] {
        self.buf.as_ref()
    }
}

/// Characteristic or descriptor write request.
#[derive(Clone, Copy, Debug)]
pub struct WriteReq<'a> {
    hdl: Handle,
    off: u16,
    val: &'a [u8],
}

impl<'a> WriteReq<'a> {
    /// Creates a write request.
    #[inline(always)]
    #[must_use]
    pub const fn new(hdl: Handle, off: u16, val: &'a [u8]) -> Self {
        Self { hdl, off, val }
    }

    /// Returns the attribute handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.hdl
    }

    /// Returns the value offset.
    #[inline(always)]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.off as _
    }

    /// Returns the value to be written at the specified offset.
    #[inline(always)]
    #[must_use]
    pub const fn value(&self) -> &'a [u8] {
        self.val
    }

    /// Updates `dst` with the written value. Returns either `InvalidOffset` or
    /// `InvalidAttributeValueLength` if the written value is not a subslice of
    /// `dst`.
    #[inline]
    pub fn update(&self, mut dst: impl AsMut<[u8]>) -> IoResult {
        let Some(dst) = dst.as_mut().get_mut(self.offset()..) else {
            return Err(ErrorCode::InvalidOffset);
        };
        let Some(dst) = dst.get_mut(..self.val.len()) else {
            return Err(ErrorCode::InvalidAttributeValueLength);
        };
        dst.copy_from_slice(self.val);
        Ok(())
    }

    /// Returns the single byte value of a whole-value write.
    #[inline]
    pub fn u8(&self) -> std::result::Result<u8, ErrorCode> {
        let mut v = [0];
        match (self.off, self.val.len()) {
            (0, 1) => self.update(&mut v).map(|_| v[0]),
            (0, _) => Err(ErrorCode::InvalidAttributeValueLength),
            _ => Err(ErrorCode::InvalidOffset),
        }
    }
}

impl<'a> AsRef<[u8]> for WriteReq<'a> {
    #[inline(always)]
    fn as_ref(&self) -> &'a [u8] {
        self.val
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_offset() {
        let hdl = Handle::MIN;
        let v: Vec<u8> = (0..100).collect();

        let mut r = ReadReq::new(hdl, 0, DEFAULT_MTU);
        r.complete(&v).unwrap();
        assert_eq!(r.value(), &v[..22]);

        let mut r = ReadReq::new(hdl, 90, DEFAULT_MTU);
        r.complete(&v).unwrap();
        assert_eq!(r.value(), &v[90..]);

        let mut r = ReadReq::new(hdl, 100, DEFAULT_MTU);
        r.complete(&v).unwrap();
        assert!(r.value().is_empty());

        let mut r = ReadReq::new(hdl, 101, DEFAULT_MTU);
        assert_eq!(r.complete(&v), Err(ErrorCode::InvalidOffset));

        let mut r = ReadReq::new(hdl, 10, 185);
        r.complete(&v).unwrap();
        assert_eq!(r.value(), &v[10..]);
    }

    #[test]
    fn write_update() {
        let hdl = Handle::MIN;
        let mut dst = [0_u8; 4];
        WriteReq::new(hdl, 1, &[7, 8]).update(&mut dst).unwrap();
        assert_eq!(dst, [0, 7, 8, 0]);
        assert_eq!(
            WriteReq::new(hdl, 5, &[1]).update(&mut dst),
            Err(ErrorCode::InvalidOffset)
        );
        assert_eq!(
            WriteReq::new(hdl, 3, &[1, 2]).update(&mut dst),
            Err(ErrorCode::InvalidAttributeValueLength)
        );
        assert_eq!(WriteReq::new(hdl, 0, &[1]).u8(), Ok(1));
        assert_eq!(
            WriteReq::new(hdl, 0, &[1, 2]).u8(),
            Err(ErrorCode::InvalidAttributeValueLength)
        );
        assert_eq!(WriteReq::new(hdl, 1, &[1]).u8(), Err(ErrorCode::InvalidOffset));
    }
}

use log::trace;
use std::error;
use std::fmt;

/// A scalar value that can be read out of a big-endian byte stream.
///
/// Integers are big-endian per §6 of the file format spec. Floats are an
/// open question (§9): the original writer copies an `f32` into four raw
/// bytes in the host's native order with no byte-swap, so a file written on
/// a little-endian host only reads back correctly on another little-endian
/// host. We mirror that as-is rather than guess an endianness the original
/// author never committed to.
pub trait Scalar: Sized + Copy {
    const SIZE: usize;
    fn from_be_bytes_slice(bytes: &[u8]) -> Self;
    fn to_be_bytes_vec(self) -> Vec<u8>;
}

macro_rules! impl_scalar_be {
    ($t:ty) => {
        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            fn from_be_bytes_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_be_bytes(buf)
            }
            fn to_be_bytes_vec(self) -> Vec<u8> {
                self.to_be_bytes().to_vec()
            }
        }
    };
}

impl_scalar_be!(u8);
impl_scalar_be!(i8);
impl_scalar_be!(u16);
impl_scalar_be!(i16);
impl_scalar_be!(u32);
impl_scalar_be!(i32);
impl_scalar_be!(u64);
impl_scalar_be!(i64);

// Native order, per the open question in §9 — not byte-swapped on read or write.
impl Scalar for f32 {
    const SIZE: usize = 4;
    fn from_be_bytes_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        f32::from_ne_bytes(buf)
    }
    fn to_be_bytes_vec(self) -> Vec<u8> {
        self.to_ne_bytes().to_vec()
    }
}

#[derive(Debug)]
pub enum ReaderError {
    Truncated { wanted: usize, remaining: usize },
    MissingNulTerminator,
}

impl error::Error for ReaderError {}
impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated { wanted, remaining } => write!(
                f,
                "truncated read: wanted {} bytes, {} remaining",
                wanted, remaining
            ),
            Self::MissingNulTerminator => write!(f, "string has no NUL terminator"),
        }
    }
}

/// A cursor over an immutable byte span.
///
/// `Reader` never copies the underlying bytes; every sub-reader borrows the
/// same span with its own independent cursor.
#[derive(Clone, Copy, Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Remaining bytes from the cursor to the end of the span.
    pub fn as_slice(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Read a scalar without advancing the cursor.
    pub fn peek<T: Scalar>(&self) -> Result<T, ReaderError> {
        self.peek_at::<T>(0)
    }

    fn peek_at<T: Scalar>(&self, offset: usize) -> Result<T, ReaderError> {
        let start = self.pos + offset;
        let end = start + T::SIZE;
        if end > self.data.len() {
            return Err(ReaderError::Truncated {
                wanted: T::SIZE,
                remaining: self.remaining().saturating_sub(offset),
            });
        }
        Ok(T::from_be_bytes_slice(&self.data[start..end]))
    }

    /// Read a scalar, advancing the cursor by `size_of::<T>()`.
    pub fn get<T: Scalar>(&mut self) -> Result<T, ReaderError> {
        let value = self.peek::<T>()?;
        self.pos += T::SIZE;
        Ok(value)
    }

    /// Read a length-prefixed (`BE u32` count) vector of `T`.
    pub fn get_vec<T: Scalar>(&mut self) -> Result<Vec<T>, ReaderError> {
        let count = self.get::<u32>()? as usize;
        let mut out = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            out.push(self.get::<T>()?);
        }
        Ok(out)
    }

    /// Read bytes up to (and consuming) the next NUL byte.
    pub fn get_string(&mut self) -> Result<String, ReaderError> {
        let bytes = self.as_slice();
        let nul_at = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReaderError::MissingNulTerminator)?;
        let s = String::from_utf8_lossy(&bytes[..nul_at]).into_owned();
        self.pos += nul_at + 1;
        trace!("read string {:?} ({} bytes)", s, nul_at + 1);
        Ok(s)
    }

    /// Advance the cursor by `n` bytes without reading anything.
    pub fn advance(&mut self, n: usize) -> Result<(), ReaderError> {
        if n > self.remaining() {
            return Err(ReaderError::Truncated {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        self.pos += n;
        Ok(())
    }

    /// A sub-reader over the first `n` bytes from the current position.
    /// Does not advance this reader.
    pub fn first(&self, n: usize) -> Result<Reader<'a>, ReaderError> {
        if n > self.remaining() {
            return Err(ReaderError::Truncated {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        Ok(Reader {
            data: &self.data[self.pos..self.pos + n],
            pos: 0,
        })
    }

    /// A sub-reader over everything after skipping `n` bytes from the
    /// current position. Does not advance this reader.
    pub fn subspan(&self, n: usize) -> Result<Reader<'a>, ReaderError> {
        if n > self.remaining() {
            return Err(ReaderError::Truncated {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        Ok(Reader {
            data: self.data,
            pos: self.pos + n,
        })
    }

    /// Read a raw byte slice of length `n`, advancing the cursor.
    pub fn get_bytes(&mut self, n: usize) -> Result<&'a [u8], ReaderError> {
        if n > self.remaining() {
            return Err(ReaderError::Truncated {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_advances_by_size() {
        let data = [0x00, 0x00, 0x01, 0x02];
        let mut r = Reader::new(&data);
        assert_eq!(r.get::<u32>().unwrap(), 0x0102);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn peek_is_idempotent() {
        let data = [0xAB, 0xCD];
        let r = Reader::new(&data);
        assert_eq!(r.peek::<u16>().unwrap(), 0xABCD);
        assert_eq!(r.peek::<u16>().unwrap(), 0xABCD);
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn truncated_get_fails() {
        let data = [0x00];
        let mut r = Reader::new(&data);
        assert!(r.get::<u16>().is_err());
    }

    #[test]
    fn get_string_reads_to_nul() {
        let data = b"hello\0world";
        let mut r = Reader::new(data);
        assert_eq!(r.get_string().unwrap(), "hello");
        assert_eq!(r.as_slice(), b"world");
    }

    #[test]
    fn first_does_not_advance() {
        let data = [1, 2, 3, 4];
        let r = Reader::new(&data);
        let sub = r.first(2).unwrap();
        assert_eq!(sub.as_slice(), &[1, 2]);
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn subspan_skips_from_current() {
        let data = [1, 2, 3, 4];
        let r = Reader::new(&data);
        let sub = r.subspan(2).unwrap();
        assert_eq!(sub.as_slice(), &[3, 4]);
        assert_eq!(r.position(), 0);
    }
}

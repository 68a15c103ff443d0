use crate::reader::Scalar;

/// An append-only byte sink, the mirror image of [`crate::Reader`].
#[derive(Clone, Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn append<T: Scalar>(&mut self, value: T) {
        self.buf.extend_from_slice(&value.to_be_bytes_vec());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn append_vec<T: Scalar>(&mut self, values: &[T]) {
        self.append(values.len() as u32);
        for v in values {
            self.append(*v);
        }
    }

    pub fn append_null_terminated_string(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }
}

/// `tag4 || BE32(payload.len) || payload || "END " || tag4`
pub fn construct_block(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.append_bytes(tag);
    w.append(payload.len() as u32);
    w.append_bytes(payload);
    w.append_bytes(b"END ");
    w.append_bytes(tag);
    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_scalar_is_big_endian() {
        let mut w = Writer::new();
        w.append::<u32>(0x0102_0304);
        assert_eq!(w.as_bytes(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn construct_block_round_trips_with_reader() {
        let bytes = construct_block(b"NAME", b"hi");
        let mut r = crate::Reader::new(&bytes);
        assert_eq!(r.get_bytes(4).unwrap(), b"NAME");
        assert_eq!(r.get::<u32>().unwrap(), 2);
        assert_eq!(r.get_bytes(2).unwrap(), b"hi");
        assert_eq!(r.get_bytes(4).unwrap(), b"END ");
        assert_eq!(r.get_bytes(4).unwrap(), b"NAME");
    }
}

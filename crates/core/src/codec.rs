//! Fixed-width big-endian field writer and reader.
//!
//! Callers check the total input length before reading, so the reader never
//! runs past the end of its buffer.

use crate::types::{Address, Hash, SignatureBytes, ADDRESS_BYTES, ROOT_BYTES, SIGNATURE_BYTES};

#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    /// Write the low `width` bytes of `value`
    pub(crate) fn uint(&mut self, value: u64, width: usize) {
        self.buf.extend_from_slice(&value.to_be_bytes()[8 - width..]);
    }

    pub(crate) fn address(&mut self, address: &Address) {
        self.buf.extend_from_slice(address.as_slice());
    }

    pub(crate) fn hash(&mut self, hash: &Hash) {
        self.buf.extend_from_slice(hash);
    }

    pub(crate) fn signature(&mut self, signature: &SignatureBytes) {
        self.buf.extend_from_slice(signature.as_slice());
    }

    pub(crate) fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        slice
    }

    pub(crate) fn uint(&mut self, width: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes[8 - width..].copy_from_slice(self.take(width));
        u64::from_be_bytes(bytes)
    }

    pub(crate) fn address(&mut self) -> Address {
        Address::from_slice(self.take(ADDRESS_BYTES))
    }

    pub(crate) fn hash(&mut self) -> Hash {
        let mut hash = [0u8; ROOT_BYTES];
        hash.copy_from_slice(self.take(ROOT_BYTES));
        hash
    }

    pub(crate) fn signature(&mut self) -> SignatureBytes {
        SignatureBytes::from_slice(self.take(SIGNATURE_BYTES))
    }

    pub(crate) fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn rest(&mut self, len: usize) -> &'a [u8] {
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_width() {
        let mut writer = Writer::default();
        writer.uint(0x0102_0304_0506, 5);
        writer.uint(7, 3);
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0x02, 0x03, 0x04, 0x05, 0x06, 0, 0, 7]);

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.uint(5), 0x02_0304_0506);
        assert_eq!(reader.uint(3), 7);
        assert_eq!(reader.remaining(), 0);
    }
}

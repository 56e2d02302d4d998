//! Little endian encoding of the primitive values that make up the cache
//! file. Strings and sequences are prefixed with their length as a `u64`.
use crate::error::CacheError;

#[derive(Debug, Default)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(value as u8);
    }

    pub fn write_len(&mut self, len: usize) {
        self.write_u64(len as u64);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Write a sequence of words, prefixed with the word count.
    pub fn write_words(&mut self, words: &[u32]) {
        self.write_len(words.len());
        for word in words {
            self.write_u32(*word);
        }
    }

    /// Append the contents of another writer.
    pub fn append(&mut self, other: ByteWriter) {
        self.bytes.extend(other.bytes);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// The number of bytes that haven't been read yet.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, count: usize) -> Result<&'a [u8], CacheError> {
        if count > self.remaining() {
            return Err(CacheError::corrupted(format!(
                "expected {count} bytes at offset {}, but only {} remain",
                self.offset,
                self.remaining()
            )));
        }

        let bytes = &self.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CacheError> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub fn read_u32(&mut self) -> Result<u32, CacheError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CacheError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CacheError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, CacheError> {
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CacheError::corrupted(format!(
                "invalid boolean {other} at offset {}",
                self.offset - 1
            ))),
        }
    }

    /// Read a length prefix, a length can never exceed the bytes that are
    /// left when every item takes at least `item_size` bytes.
    pub fn read_len(&mut self, item_size: usize) -> Result<usize, CacheError> {
        let len = self.read_u64()?;

        match usize::try_from(len) {
            Ok(len) if len.saturating_mul(item_size) <= self.remaining() => Ok(len),
            _ => Err(CacheError::corrupted(format!(
                "length {len} at offset {} runs past the end of the file",
                self.offset - 8
            ))),
        }
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8], CacheError> {
        let len = self.read_len(1)?;
        self.take(len)
    }

    pub fn read_str(&mut self) -> Result<&'a str, CacheError> {
        let offset = self.offset;
        std::str::from_utf8(self.read_bytes()?)
            .map_err(|_| CacheError::corrupted(format!("invalid UTF-8 string at offset {offset}")))
    }

    pub fn read_words(&mut self) -> Result<Vec<u32>, CacheError> {
        let len = self.read_len(4)?;
        (0..len).map(|_| self.read_u32()).collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn values_are_little_endian() {
        let mut writer = ByteWriter::new();
        writer.write_u32(0x4344_4853);
        writer.write_str("ab");
        writer.write_bool(true);

        assert_eq!(
            writer.into_bytes(),
            [0x53, 0x48, 0x44, 0x43, 2, 0, 0, 0, 0, 0, 0, 0, b'a', b'b', 1]
        );
    }

    #[test]
    fn reads_what_was_written() {
        let mut writer = ByteWriter::new();
        writer.write_i64(-42);
        writer.write_words(&[7, 0x0723_0203]);
        writer.write_str("sky.wgsl");

        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_i64().unwrap(), -42);
        assert_eq!(reader.read_words().unwrap(), [7, 0x0723_0203]);
        assert_eq!(reader.read_str().unwrap(), "sky.wgsl");
        assert!(reader.is_at_end());
    }

    #[test]
    fn rejects_malformed_values() {
        let mut reader = ByteReader::new(&[2]);
        assert!(matches!(reader.read_bool(), Err(CacheError::Corrupted(_))));

        let huge = u64::MAX.to_le_bytes();
        assert!(ByteReader::new(&huge).read_bytes().is_err());
        assert!(ByteReader::new(&[1, 2, 3]).read_u32().is_err());
    }
}

//! Binary data parsing utilities shared across formats.
//!
//! This module provides functions for reading fixed-width numbers in either
//! byte order, a bounds-checked cursor used by the container reader and the
//! codec header probes, and a little-endian writer used by the serializer.

use zerocopy::{BE, F64, FromBytes, I16, I32, I64, IntoBytes, LE, U16, U32};

/// Binary parsing error type
#[derive(Debug, Clone)]
pub enum BinaryError {
    /// Not enough data to read the requested type
    InsufficientData { expected: usize, available: usize },
    /// Failed to parse the data
    ParseError(String),
}

impl std::fmt::Display for BinaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryError::InsufficientData {
                expected,
                available,
            } => {
                write!(
                    f,
                    "Insufficient data: expected {}, got {}",
                    expected, available
                )
            },
            BinaryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for BinaryError {}

/// Result type for binary operations
pub type BinaryResult<T> = Result<T, BinaryError>;

/// Byte order of a serialized structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Least significant byte first (the order this crate writes)
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

#[inline]
fn check(data: &[u8], offset: usize, len: usize) -> BinaryResult<&[u8]> {
    match offset.checked_add(len) {
        Some(end) if end <= data.len() => Ok(&data[offset..end]),
        _ => Err(BinaryError::InsufficientData {
            expected: offset.saturating_add(len),
            available: data.len(),
        }),
    }
}

/// Read a little-endian u16 from a byte slice at the given offset.
///
/// # Examples
///
/// ```
/// use pictura::common::binary::read_u16_le;
/// let data = [0x34, 0x12, 0x78, 0x56];
/// assert_eq!(read_u16_le(&data, 0).unwrap(), 0x1234);
/// assert_eq!(read_u16_le(&data, 2).unwrap(), 0x5678);
/// ```
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> BinaryResult<u16> {
    U16::<LE>::read_from_bytes(check(data, offset, 2)?)
        .map(|v| v.get())
        .map_err(|_| BinaryError::ParseError("Failed to read u16".to_string()))
}

/// Read a big-endian u16 from a byte slice at the given offset.
#[inline]
pub fn read_u16_be(data: &[u8], offset: usize) -> BinaryResult<u16> {
    U16::<BE>::read_from_bytes(check(data, offset, 2)?)
        .map(|v| v.get())
        .map_err(|_| BinaryError::ParseError("Failed to read u16".to_string()))
}

/// Read a little-endian i16 from a byte slice at the given offset.
#[inline]
pub fn read_i16_le(data: &[u8], offset: usize) -> BinaryResult<i16> {
    I16::<LE>::read_from_bytes(check(data, offset, 2)?)
        .map(|v| v.get())
        .map_err(|_| BinaryError::ParseError("Failed to read i16".to_string()))
}

/// Read a big-endian i16 from a byte slice at the given offset.
#[inline]
pub fn read_i16_be(data: &[u8], offset: usize) -> BinaryResult<i16> {
    I16::<BE>::read_from_bytes(check(data, offset, 2)?)
        .map(|v| v.get())
        .map_err(|_| BinaryError::ParseError("Failed to read i16".to_string()))
}

/// Read a little-endian u32 from a byte slice at the given offset.
///
/// # Examples
///
/// ```
/// use pictura::common::binary::read_u32_le;
/// let data = [0x78, 0x56, 0x34, 0x12];
/// assert_eq!(read_u32_le(&data, 0).unwrap(), 0x12345678);
/// ```
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> BinaryResult<u32> {
    U32::<LE>::read_from_bytes(check(data, offset, 4)?)
        .map(|v| v.get())
        .map_err(|_| BinaryError::ParseError("Failed to read u32".to_string()))
}

/// Read a big-endian u32 from a byte slice at the given offset.
#[inline]
pub fn read_u32_be(data: &[u8], offset: usize) -> BinaryResult<u32> {
    U32::<BE>::read_from_bytes(check(data, offset, 4)?)
        .map(|v| v.get())
        .map_err(|_| BinaryError::ParseError("Failed to read u32".to_string()))
}

/// Read a little-endian i32 from a byte slice at the given offset.
///
/// # Examples
///
/// ```
/// use pictura::common::binary::read_i32_le;
/// let data = [0xFF, 0xFF, 0xFF, 0xFF];
/// assert_eq!(read_i32_le(&data, 0).unwrap(), -1i32);
/// ```
#[inline]
pub fn read_i32_le(data: &[u8], offset: usize) -> BinaryResult<i32> {
    I32::<LE>::read_from_bytes(check(data, offset, 4)?)
        .map(|v| v.get())
        .map_err(|_| BinaryError::ParseError("Failed to read i32".to_string()))
}

/// Cursor over a byte slice that reads numbers in a fixed byte order.
///
/// All reads are bounds-checked; a failed read leaves the position unchanged.
#[derive(Debug, Clone)]
pub struct ByteReader<'data> {
    data: &'data [u8],
    pos: usize,
    order: ByteOrder,
}

macro_rules! reader_method {
    ($name:ident, $ty:ty, $wrapper:ident, $len:expr) => {
        #[inline]
        pub fn $name(&mut self) -> BinaryResult<$ty> {
            let bytes = check(self.data, self.pos, $len)?;
            let value = match self.order {
                ByteOrder::Little => $wrapper::<LE>::read_from_bytes(bytes).map(|v| v.get()).ok(),
                ByteOrder::Big => $wrapper::<BE>::read_from_bytes(bytes).map(|v| v.get()).ok(),
            }
            .ok_or_else(|| BinaryError::ParseError(concat!("Failed to read ", stringify!($ty)).to_string()))?;
            self.pos += $len;
            Ok(value)
        }
    };
}

impl<'data> ByteReader<'data> {
    /// Create a little-endian reader positioned at the start of `data`.
    pub fn new(data: &'data [u8]) -> Self {
        Self::with_order(data, ByteOrder::Little)
    }

    /// Create a reader with an explicit byte order.
    pub fn with_order(data: &'data [u8], order: ByteOrder) -> Self {
        Self {
            data,
            pos: 0,
            order,
        }
    }

    /// Byte order used by this reader.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Current offset from the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Move to an absolute offset.
    pub fn seek(&mut self, pos: usize) -> BinaryResult<()> {
        if pos > self.data.len() {
            return Err(BinaryError::InsufficientData {
                expected: pos,
                available: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> BinaryResult<()> {
        check(self.data, self.pos, len)?;
        self.pos += len;
        Ok(())
    }

    #[inline]
    pub fn read_u8(&mut self) -> BinaryResult<u8> {
        let byte = check(self.data, self.pos, 1)?[0];
        self.pos += 1;
        Ok(byte)
    }

    reader_method!(read_u16, u16, U16, 2);
    reader_method!(read_u32, u32, U32, 4);
    reader_method!(read_i32, i32, I32, 4);
    reader_method!(read_i64, i64, I64, 8);
    reader_method!(read_f64, f64, F64, 8);

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> BinaryResult<&'data [u8]> {
        let bytes = check(self.data, self.pos, len)?;
        self.pos += len;
        Ok(bytes)
    }
}

/// Little-endian output buffer.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    #[inline]
    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(U16::<LE>::new(value).as_bytes());
    }

    #[inline]
    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(U32::<LE>::new(value).as_bytes());
    }

    #[inline]
    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(I32::<LE>::new(value).as_bytes());
    }

    #[inline]
    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(I64::<LE>::new(value).as_bytes());
    }

    #[inline]
    pub fn put_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(F64::<LE>::new(value).as_bytes());
    }

    #[inline]
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Overwrite a previously written u32 (used for back-patched sizes).
    pub fn patch_u32(&mut self, at: usize, value: u32) -> BinaryResult<()> {
        if at + 4 > self.buf.len() {
            return Err(BinaryError::InsufficientData {
                expected: at + 4,
                available: self.buf.len(),
            });
        }
        self.buf[at..at + 4].copy_from_slice(U32::<LE>::new(value).as_bytes());
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u16_le() {
        let data = [0x34, 0x12, 0x78, 0x56];
        assert!(read_u16_le(&data, 0).is_ok_and(|v| v == 0x1234));
        assert!(read_u16_le(&data, 2).is_ok_and(|v| v == 0x5678));
        assert!(read_u16_le(&data, 3).is_err());
    }

    #[test]
    fn test_read_u32_both_orders() {
        let data = [0x12, 0x34, 0x56, 0x78];
        assert!(read_u32_le(&data, 0).is_ok_and(|v| v == 0x78563412));
        assert!(read_u32_be(&data, 0).is_ok_and(|v| v == 0x12345678));
        assert!(read_u32_le(&data, 1).is_err());
    }

    #[test]
    fn test_offset_overflow_is_an_error() {
        let data = [0u8; 4];
        assert!(read_u32_le(&data, usize::MAX).is_err());
    }

    #[test]
    fn test_reader_big_endian() {
        let data = [0x00, 0x00, 0x00, 0x2A, 0xFF, 0xFF, 0xFF, 0xFE];
        let mut reader = ByteReader::with_order(&data, ByteOrder::Big);
        assert_eq!(reader.read_u32().unwrap(), 42);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert!(reader.read_u8().is_err());
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn test_reader_all_widths_both_orders() {
        let mut le = Vec::new();
        le.extend_from_slice(&0xBEEFu16.to_le_bytes());
        le.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        le.extend_from_slice(&(-7i32).to_le_bytes());
        le.extend_from_slice(&(-1_000_000_000_000i64).to_le_bytes());
        le.extend_from_slice(&2.25f64.to_le_bytes());

        let mut be = Vec::new();
        be.extend_from_slice(&0xBEEFu16.to_be_bytes());
        be.extend_from_slice(&0xDEADBEEFu32.to_be_bytes());
        be.extend_from_slice(&(-7i32).to_be_bytes());
        be.extend_from_slice(&(-1_000_000_000_000i64).to_be_bytes());
        be.extend_from_slice(&2.25f64.to_be_bytes());

        for (data, order) in [(&le, ByteOrder::Little), (&be, ByteOrder::Big)] {
            let mut reader = ByteReader::with_order(data, order);
            assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
            assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
            assert_eq!(reader.read_i32().unwrap(), -7);
            assert_eq!(reader.read_i64().unwrap(), -1_000_000_000_000);
            assert_eq!(reader.read_f64().unwrap(), 2.25);
            assert_eq!(reader.remaining(), 0);
            assert!(reader.read_f64().is_err());
        }
    }

    #[test]
    fn test_failed_read_keeps_position() {
        let data = [1u8, 2, 3];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert!(reader.read_u32().is_err());
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn test_writer_patch() {
        let mut writer = ByteWriter::new();
        writer.put_u32(0);
        writer.put_f64(1.5);
        writer.patch_u32(0, 0xDEADBEEF).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(read_u32_le(&bytes, 0).unwrap(), 0xDEADBEEF);
        let mut reader = ByteReader::new(&bytes[4..]);
        assert_eq!(reader.read_f64().unwrap(), 1.5);
    }
}

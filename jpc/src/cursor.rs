//! Bounds-checked reading over an in-memory buffer.
//!
//! Every structure in the codestream and in the JP2 box hierarchy is read
//! through a [`ByteCursor`]. A read either returns exactly the requested bytes
//! or fails with [`CursorError::UnexpectedEof`]; the cursor never hands back a
//! short read and never moves past the end of its buffer.

use thiserror::Error;

/// Errors raised by [`ByteCursor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// Fewer bytes remain than were requested.
    #[error("unexpected end of data at offset {offset}: requested {requested} bytes, {available} available")]
    UnexpectedEof {
        offset: u64,
        requested: u64,
        available: u64,
    },

    /// Seek target lies outside the buffer.
    #[error("offset {offset} is out of bounds for buffer of length {length}")]
    OutOfBounds { offset: u64, length: u64 },
}

/// Forward reading view over an immutable byte buffer.
///
/// Offsets reported by the cursor are absolute: the cursor may be created over
/// a sub-slice of a larger file, in which case `base` is the offset of the
/// first byte of the slice within that file.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    base: u64,
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> ByteCursor<'a> {
        Self::with_base(data, 0)
    }

    /// Cursor over `data`, which starts at absolute offset `base`.
    pub fn with_base(data: &'a [u8], base: u64) -> ByteCursor<'a> {
        ByteCursor {
            data,
            base,
            position: 0,
        }
    }

    /// Absolute offset of the next byte to be read.
    pub fn offset(&self) -> u64 {
        self.base + self.position as u64
    }

    /// Position relative to the start of this cursor's buffer.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Absolute offset of the first byte of this cursor's buffer.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Length of this cursor's buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> u64 {
        (self.data.len() - self.position) as u64
    }

    pub fn is_at_end(&self) -> bool {
        self.position == self.data.len()
    }

    pub fn peek(&self, n: usize) -> Result<&'a [u8], CursorError> {
        let available = self.data.len() - self.position;
        if n > available {
            return Err(CursorError::UnexpectedEof {
                offset: self.offset(),
                requested: n as u64,
                available: available as u64,
            });
        }
        Ok(&self.data[self.position..self.position + n])
    }

    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        let bytes = self.peek(n)?;
        self.position += n;
        Ok(bytes)
    }

    /// Moves to `position`, relative to the start of this cursor's buffer.
    ///
    /// Seeking to the end of the buffer is allowed; any further read fails.
    pub fn seek(&mut self, position: usize) -> Result<(), CursorError> {
        if position > self.data.len() {
            return Err(CursorError::OutOfBounds {
                offset: self.base + position as u64,
                length: self.data.len() as u64,
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), CursorError> {
        self.read_exact(n).map(|_| ())
    }

    /// Everything from the current position to the end of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Bytes `start..end` of this cursor's buffer, relative to its start.
    pub fn slice(&self, start: usize, end: usize) -> Result<&'a [u8], CursorError> {
        if start > end || end > self.data.len() {
            return Err(CursorError::OutOfBounds {
                offset: self.base + end as u64,
                length: self.data.len() as u64,
            });
        }
        Ok(&self.data[start..end])
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let mut buffer = [0u8; N];
        buffer.copy_from_slice(self.read_exact(N)?);
        Ok(buffer)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.read_exact(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn peek_u16(&self) -> Result<u16, CursorError> {
        let bytes = self.peek(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_big_endian() -> Result<(), CursorError> {
        let data = [0xFF, 0x4F, 0x00, 0x00, 0x00, 0x0C, 0x07];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u16()?, 0xFF4F);
        assert_eq!(cursor.read_u32()?, 12);
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.read_u8()?, 7);
        assert!(cursor.is_at_end());
        Ok(())
    }

    #[test]
    fn test_read_past_end_fails_without_moving() {
        let data = [1, 2, 3];
        let mut cursor = ByteCursor::with_base(&data, 100);
        cursor.skip(1).unwrap();
        assert_eq!(
            cursor.read_exact(3),
            Err(CursorError::UnexpectedEof {
                offset: 101,
                requested: 3,
                available: 2
            })
        );
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_exact(2).unwrap(), &[2, 3]);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let data = [0xFF, 0xD9];
        let cursor = ByteCursor::new(&data);
        assert_eq!(cursor.peek_u16().unwrap(), 0xFFD9);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_seek_bounds() {
        let data = [0u8; 8];
        let mut cursor = ByteCursor::with_base(&data, 16);
        assert!(cursor.seek(8).is_ok());
        assert!(cursor.is_at_end());
        assert_eq!(
            cursor.seek(9),
            Err(CursorError::OutOfBounds {
                offset: 25,
                length: 8
            })
        );
        assert_eq!(cursor.offset(), 24);
    }
}

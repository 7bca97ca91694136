//! Cursor-based byte stream parser for archive and COFF structures.
//!
//! [`crate::file::parser::Parser`] keeps a position within a byte slice and offers
//! bounds-checked reads of endian-aware primitives, raw sub-slices, NUL-terminated strings
//! and the fixed-width ASCII fields used by `ar` member headers.
//!
//! # Usage Examples
//!
//! ```rust
//! use comlink::Parser;
//!
//! let data = b"!<arch>\n/               ";
//! let mut parser = Parser::new(data);
//!
//! assert_eq!(parser.read_bytes(8)?, b"!<arch>\n");
//! assert_eq!(parser.read_ascii_field(16)?, "/");
//! assert!(!parser.has_more_data());
//! # Ok::<(), comlink::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, read_le_at, ByteIO},
    Result,
};

/// A binary data parser over a borrowed byte slice.
///
/// All reads are bounds-checked; a failed read leaves the position unchanged and returns
/// [`crate::Error::OutOfBounds`] naming the offset and width of the attempted read.
///
/// # Examples
///
/// ```rust
/// use comlink::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut parser = Parser::new(&data);
///
/// let first = parser.read_le::<u32>()?;
/// assert_eq!(first, 0x04030201);
///
/// parser.seek(6)?;
/// let last = parser.read_be::<u16>()?;
/// assert_eq!(last, 0x0708);
/// # Ok::<(), comlink::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes between the current position and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to exactly the end of the data is allowed; the next read will fail.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!(pos, 0));
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(out_of_bounds_error!(self.position, step)),
        }
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        match self.data.get(self.position) {
            Some(byte) => Ok(*byte),
            None => Err(out_of_bounds_error!(self.position, 1)),
        }
    }

    /// Align the position to a specific boundary (a power of 2).
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if aligning would exceed the data length.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: ByteIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a type `T` from the current position in big-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_be<T: ByteIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Read `len` raw bytes as a sub-slice of the original buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(len)?;
        Ok(&self.data[start..self.position])
    }

    /// Read a NUL-terminated UTF-8 string and advance past the terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no terminator is found before the end of the
    /// data, or [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let start = self.position;
        let Some(length) = self.data[start.min(self.data.len())..]
            .iter()
            .position(|byte| *byte == 0)
        else {
            return Err(out_of_bounds_error!(start, self.remaining() + 1));
        };

        let value = std::str::from_utf8(&self.data[start..start + length])
            .map_err(|_| malformed_error!("Invalid UTF-8 string at offset {}", start))?;
        self.position = start + length + 1;
        Ok(value)
    }

    /// Read a fixed-width ASCII field and strip its trailing space padding.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the field is truncated, or
    /// [`crate::Error::Malformed`] if it contains non-ASCII bytes.
    pub fn read_ascii_field(&mut self, width: usize) -> Result<&'a str> {
        let start = self.position;
        let bytes = self.read_bytes(width)?;
        if !bytes.is_ascii() {
            self.position = start;
            return Err(malformed_error!(
                "Non-ASCII header field at offset {}",
                start
            ));
        }

        // ASCII was just checked, the conversion can not fail
        let text = std::str::from_utf8(bytes)
            .map_err(|_| malformed_error!("Invalid header field at offset {}", start))?;
        Ok(text.trim_end_matches(' '))
    }

    /// Read a fixed-width, space padded ASCII number in the given radix.
    ///
    /// A field that is entirely blank yields `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the field is truncated, or
    /// [`crate::Error::Malformed`] if it is neither blank nor a number.
    pub fn read_ascii_number(&mut self, width: usize, radix: u32) -> Result<Option<u64>> {
        let start = self.position;
        let field = self.read_ascii_field(width)?.trim_start_matches(' ');
        if field.is_empty() {
            return Ok(None);
        }

        match u64::from_str_radix(field, radix) {
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(malformed_error!(
                "Invalid numeric field '{}' at offset {}",
                field,
                start
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0201);
        assert_eq!(parser.read_be::<u16>().unwrap(), 0x0304);
        assert_eq!(parser.remaining(), 2);
        assert_eq!(parser.read_bytes(2).unwrap(), &[0x05, 0x06]);
        assert!(!parser.has_more_data());
        assert!(parser.read_le::<u8>().is_err());
    }

    #[test]
    fn seek_and_align() {
        let data = [0u8; 8];
        let mut parser = Parser::new(&data);

        parser.advance_by(1).unwrap();
        parser.align(2).unwrap();
        assert_eq!(parser.pos(), 2);
        parser.seek(8).unwrap();
        assert!(parser.seek(9).is_err());
        assert!(parser.advance_by(1).is_err());
        assert_eq!(parser.pos(), 8);
    }

    #[test]
    fn cstr() {
        let data = b"Foo\0Bar\0Baz";
        let mut parser = Parser::new(data);

        assert_eq!(parser.read_cstr().unwrap(), "Foo");
        assert_eq!(parser.read_cstr().unwrap(), "Bar");
        assert_eq!(parser.pos(), 8);
        assert!(parser.read_cstr().is_err());
        assert_eq!(parser.pos(), 8);
    }

    #[test]
    fn ascii_fields() {
        let data = b"1234    644     `\n    ";
        let mut parser = Parser::new(data);

        assert_eq!(parser.read_ascii_number(8, 10).unwrap(), Some(1234));
        assert_eq!(parser.read_ascii_number(8, 8).unwrap(), Some(0o644));
        assert_eq!(parser.read_bytes(2).unwrap(), b"`\n");
        assert_eq!(parser.read_ascii_number(4, 10).unwrap(), None);
    }

    #[test]
    fn ascii_number_rejects_garbage() {
        let mut parser = Parser::new(b"12ab  ");
        assert!(parser.read_ascii_number(6, 10).unwrap_err().is_format());
    }
}

use super::{Endianness, ParseError};

/// Cursor over a byte slice that decodes integers in a declared byte order.
#[derive(Debug, Clone)]
pub struct StreamReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    endianness: Endianness,
}

impl<'a> StreamReader<'a> {
    pub fn new(bytes: &'a [u8], endianness: Endianness) -> Self {
        Self {
            bytes,
            cursor: 0,
            endianness,
        }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        if len > self.remaining() {
            return Err(ParseError::UnexpectedEof {
                offset: self.cursor,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.bytes[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let buf = self.read_array::<2>()?;
        Ok(match self.endianness {
            Endianness::Little => u16::from_le_bytes(buf),
            Endianness::Big => u16::from_be_bytes(buf),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let buf = self.read_array::<4>()?;
        Ok(match self.endianness {
            Endianness::Little => u32::from_le_bytes(buf),
            Endianness::Big => u32::from_be_bytes(buf),
        })
    }

    pub fn read_f64(&mut self) -> Result<f64, ParseError> {
        let buf = self.read_array::<8>()?;
        Ok(match self.endianness {
            Endianness::Little => f64::from_le_bytes(buf),
            Endianness::Big => f64::from_be_bytes(buf),
        })
    }

    /// Reads `len` bytes whose final byte must be a NUL terminator.
    ///
    /// Returns `Ok(None)` when the bytes are present but not terminated.
    /// Characters are decoded one byte per code point.
    pub fn read_terminated_str(&mut self, len: usize) -> Result<Option<String>, ParseError> {
        let bytes = self.read_bytes(len)?;
        match bytes.split_last() {
            Some((&0, text)) => Ok(Some(text.iter().map(|&b| char::from(b)).collect())),
            _ => Ok(None),
        }
    }
}

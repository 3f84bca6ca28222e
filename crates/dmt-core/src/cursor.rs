// Bounds-checked big-endian reader; every structural field of a tag tree goes through here.
use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, TagError};

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Borrow exactly `n` bytes and advance past them.
    ///
    /// Fails without moving when fewer than `n` bytes are left.
    pub fn take(&mut self, n: u64) -> Result<&'a [u8]> {
        let len = match usize::try_from(n) {
            Ok(len) if len <= self.remaining() => len,
            _ => {
                return Err(TagError::Truncated {
                    at_offset: self.pos,
                    needed: n,
                });
            }
        };
        let s = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(s)
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(TagError::Truncated {
                at_offset: self.pos,
                needed: 1,
            })
    }
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }
    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }
    pub fn read_u64_be(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }
}

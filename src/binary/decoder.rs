//! Binary decoder for nodes.
//!
//! Marker table:
//!   0xF8 list (u8 count)        0xF9 list (u16 count)
//!   0xFB byte blob (u24 len)
//!   0xFC string (u8 len)        0xFD string (u16 len)   0xFE string (u24 len)
//!   0x00 end-of-stream sentinel
//!
//! The sentinel is sent by the server on stream teardown; it decodes to
//! `DecodeError::StreamEnd`, which the connection silently tolerates.

use thiserror::Error;

use super::encoder::{BINARY_24, LIST_16, LIST_8, STRING_16, STRING_24, STRING_8};
use super::node::{Attrs, Node, NodeContent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// End-of-stream sentinel; not an error worth surfacing.
    #[error("end of stream")]
    StreamEnd,
    #[error("unexpected end of data")]
    Eof,
    #[error("unknown marker 0x{0:02x}")]
    UnknownMarker(u8),
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("node list is empty")]
    EmptyList,
    #[error("{0} leftover bytes after node")]
    Leftover(usize),
}

/// Decode a single node, requiring the buffer to be fully consumed.
pub fn decode(data: &[u8]) -> Result<Node, DecodeError> {
    if data.is_empty() || data == [0x00] {
        return Err(DecodeError::StreamEnd);
    }

    let mut decoder = Decoder { data, index: 0 };
    let node = decoder.read_node()?;
    let leftover = decoder.data.len() - decoder.index;
    if leftover != 0 {
        return Err(DecodeError::Leftover(leftover));
    }
    Ok(node)
}

struct Decoder<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> Decoder<'a> {
    fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.data.get(self.index).ok_or(DecodeError::Eof)?;
        self.index += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.index.checked_add(n).ok_or(DecodeError::Eof)?;
        let slice = self.data.get(self.index..end).ok_or(DecodeError::Eof)?;
        self.index = end;
        Ok(slice)
    }

    fn read_len(&mut self, width: usize) -> Result<usize, DecodeError> {
        let mut len = 0usize;
        for _ in 0..width {
            len = (len << 8) | usize::from(self.read_byte()?);
        }
        Ok(len)
    }

    fn read_list_size(&mut self) -> Result<usize, DecodeError> {
        match self.read_byte()? {
            LIST_8 => Ok(usize::from(self.read_byte()?)),
            LIST_16 => self.read_len(2),
            other => Err(DecodeError::UnknownMarker(other)),
        }
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = match self.read_byte()? {
            STRING_8 => usize::from(self.read_byte()?),
            STRING_16 => self.read_len(2)?,
            STRING_24 => self.read_len(3)?,
            other => return Err(DecodeError::UnknownMarker(other)),
        };
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    fn read_node(&mut self) -> Result<Node, DecodeError> {
        let size = self.read_list_size()?;
        if size == 0 {
            return Err(DecodeError::EmptyList);
        }

        let tag = self.read_string()?;

        let attr_pairs = (size - 1) / 2;
        let mut attrs = Attrs::with_capacity(attr_pairs);
        for _ in 0..attr_pairs {
            let key = self.read_string()?;
            let value = self.read_string()?;
            attrs.insert(key, value);
        }

        // An odd remainder after the tag means a trailing content element.
        let content = if (size - 1) % 2 == 1 {
            match *self.data.get(self.index).ok_or(DecodeError::Eof)? {
                LIST_8 | LIST_16 => {
                    let count = self.read_list_size()?;
                    let mut children = Vec::with_capacity(count);
                    for _ in 0..count {
                        children.push(self.read_node()?);
                    }
                    NodeContent::Children(children)
                }
                BINARY_24 => {
                    self.index += 1;
                    let len = self.read_len(3)?;
                    NodeContent::Bytes(self.read_bytes(len)?.to_vec())
                }
                other => return Err(DecodeError::UnknownMarker(other)),
            }
        } else {
            NodeContent::None
        };

        Ok(Node { tag, attrs, content })
    }
}

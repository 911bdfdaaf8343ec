//! Binary encoder for nodes.
//!
//! A node is a counted list: tag, attribute key/value pairs, and an optional
//! trailing content element (child list or byte blob). Strings and blobs use
//! length-marked headers; see `decoder` for the marker table.

use super::node::{Node, NodeContent};

pub(super) const LIST_8: u8 = 0xF8;
pub(super) const LIST_16: u8 = 0xF9;
pub(super) const BINARY_24: u8 = 0xFB;
pub(super) const STRING_8: u8 = 0xFC;
pub(super) const STRING_16: u8 = 0xFD;
pub(super) const STRING_24: u8 = 0xFE;

/// Encode a node to its wire form.
pub fn encode(node: &Node) -> Vec<u8> {
    let mut encoder = Encoder { data: Vec::new() };
    encoder.write_node(node);
    encoder.data
}

struct Encoder {
    data: Vec<u8>,
}

impl Encoder {
    fn write_node(&mut self, node: &Node) {
        let has_content = !matches!(node.content, NodeContent::None);
        let size = 1 + 2 * node.attrs.len() + usize::from(has_content);
        self.write_list_header(size);

        self.write_string(&node.tag);
        for (key, value) in &node.attrs {
            self.write_string(key);
            self.write_string(value);
        }

        match &node.content {
            NodeContent::None => {}
            NodeContent::Children(children) => {
                self.write_list_header(children.len());
                for child in children {
                    self.write_node(child);
                }
            }
            NodeContent::Bytes(bytes) => {
                self.data.push(BINARY_24);
                self.write_len(bytes.len(), 3);
                self.data.extend_from_slice(bytes);
            }
        }
    }

    fn write_list_header(&mut self, size: usize) {
        if size < 256 {
            self.data.push(LIST_8);
            self.data.push(size as u8);
        } else {
            self.data.push(LIST_16);
            self.write_len(size, 2);
        }
    }

    fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        if bytes.len() < 256 {
            self.data.push(STRING_8);
            self.data.push(bytes.len() as u8);
        } else if bytes.len() < 65_536 {
            self.data.push(STRING_16);
            self.write_len(bytes.len(), 2);
        } else {
            self.data.push(STRING_24);
            self.write_len(bytes.len(), 3);
        }
        self.data.extend_from_slice(bytes);
    }

    fn write_len(&mut self, len: usize, width: usize) {
        for shift in (0..width).rev() {
            self.data.push(((len >> (shift * 8)) & 0xFF) as u8);
        }
    }
}

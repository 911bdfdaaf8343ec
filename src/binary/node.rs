//! The application PDU: a tag, string attributes, and content.

use std::collections::HashMap;

/// Attribute map. Order-insensitive on the wire.
pub type Attrs = HashMap<String, String>;

/// A node: tag + attributes + content, the unit every encrypted frame
/// carries after the handshake.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    pub tag: String,
    pub attrs: Attrs,
    pub content: NodeContent,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeContent {
    #[default]
    None,
    Children(Vec<Node>),
    Bytes(Vec<u8>),
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attrs::new(),
            content: NodeContent::None,
        }
    }

    pub fn with_attrs<K, V>(tag: impl Into<String>, attrs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            tag: tag.into(),
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            content: NodeContent::None,
        }
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// The `id` attribute, when present. Used for request correlation.
    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn add_child(&mut self, child: Node) -> &mut Self {
        match &mut self.content {
            NodeContent::Children(children) => children.push(child),
            _ => self.content = NodeContent::Children(vec![child]),
        }
        self
    }

    pub fn set_children(&mut self, children: Vec<Node>) -> &mut Self {
        self.content = NodeContent::Children(children);
        self
    }

    pub fn set_bytes(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.content = NodeContent::Bytes(bytes);
        self
    }

    pub fn children(&self) -> &[Node] {
        match &self.content {
            NodeContent::Children(children) => children,
            _ => &[],
        }
    }

    pub fn child(&self, tag: &str) -> Option<&Node> {
        self.children().iter().find(|n| n.tag == tag)
    }

    pub fn children_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children().iter().filter(move |n| n.tag == tag)
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.content {
            NodeContent::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

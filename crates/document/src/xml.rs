//! Index-addressed XML tree.
//!
//! Nodes live in one arena and refer to each other by [`NodeId`]. Removing
//! a subtree only unlinks it from its parent, so ids held elsewhere stay
//! valid and a stale id can be detected with [`XmlTree::is_attached`].
//!
//! The tree round-trips everything a document part contains (declaration,
//! comments, processing instructions, namespaced attributes) so untouched
//! content is serialized back unchanged.

use quick_xml::Reader;
use quick_xml::escape::{escape, partial_escape, unescape};
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    /// Attribute values are kept escaped, exactly as read.
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// Unescaped character data
    Text(String),
    CData(String),
    Comment(String),
    Decl(String),
    Pi(String),
    DocType(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
}

impl Default for XmlTree {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }
}

impl XmlTree {
    pub const ROOT: NodeId = 0;

    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut tree = XmlTree::default();
        let mut stack = vec![Self::ROOT];
        loop {
            let event = reader
                .read_event()
                .map_err(|e| format!("{e} (at byte {})", reader.buffer_position()))?;
            let current = stack.last().copied().unwrap_or(Self::ROOT);
            match event {
                Event::Start(e) => {
                    let id = tree.push(current, element(&e)?);
                    stack.push(id);
                }
                Event::Empty(e) => {
                    tree.push(current, element(&e)?);
                }
                Event::End(_) => {
                    if stack.len() <= 1 {
                        return Err("closing tag without an open element".into());
                    }
                    stack.pop();
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|e| e.to_string())?;
                    tree.push(current, NodeKind::Text(text.into_owned()));
                }
                Event::CData(e) => {
                    tree.push(current, NodeKind::CData(lossy(&e)));
                }
                Event::Comment(e) => {
                    tree.push(current, NodeKind::Comment(lossy(&e)));
                }
                Event::Decl(e) => {
                    tree.push(current, NodeKind::Decl(lossy(&e)));
                }
                Event::PI(e) => {
                    tree.push(current, NodeKind::Pi(lossy(&e)));
                }
                Event::DocType(e) => {
                    tree.push(current, NodeKind::DocType(lossy(&e)));
                }
                Event::Eof => break,
            }
        }
        if stack.len() > 1 {
            return Err("document ended with unclosed elements".into());
        }
        Ok(tree)
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_node(Self::ROOT, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Document => {
                for &child in &node.children {
                    self.write_node(child, out);
                }
            }
            NodeKind::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attrs {
                    let quote = if value.contains('"') { '\'' } else { '"' };
                    out.push(' ');
                    out.push_str(key);
                    out.push('=');
                    out.push(quote);
                    out.push_str(value);
                    out.push(quote);
                }
                if node.children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for &child in &node.children {
                        self.write_node(child, out);
                    }
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
            NodeKind::Text(text) => out.push_str(&partial_escape(text.as_str())),
            NodeKind::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Decl(text) | NodeKind::Pi(text) => {
                out.push_str("<?");
                out.push_str(text);
                out.push_str("?>");
            }
            NodeKind::DocType(text) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(text);
                out.push('>');
            }
        }
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    // ── Navigation ──────────────────────────────────────────────────

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    /// Qualified element name, `None` for non-element nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is(&self, id: NodeId, name: &str) -> bool {
        self.name(id) == Some(name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Element children with the given name.
    pub fn children_named<'a>(&'a self, id: NodeId, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(move |&c| self.is(c, name))
    }

    /// All elements named `name` below `from`, in document order.
    pub fn find_all(&self, from: NodeId, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut pending: Vec<NodeId> = self.nodes[from].children.iter().rev().copied().collect();
        while let Some(id) = pending.pop() {
            if self.is(id, name) {
                found.push(id);
            }
            pending.extend(self.nodes[id].children.iter().rev().copied());
        }
        found
    }

    pub fn has_descendant(&self, from: NodeId, names: &[&str]) -> bool {
        self.nodes[from]
            .children
            .iter()
            .any(|&c| self.name(c).is_some_and(|n| names.contains(&n)) || self.has_descendant(c, names))
    }

    /// Ids from the root down to `id`, inclusive.
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Nearest ancestor (excluding `id`) with the given name.
    pub fn ancestor_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        let mut current = self.nodes[id].parent;
        while let Some(node) = current {
            if self.is(node, name) {
                return Some(node);
            }
            current = self.nodes[node].parent;
        }
        None
    }

    /// True while the node is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.path_from_root(id).first() == Some(&Self::ROOT)
    }

    // ── Attributes and text ─────────────────────────────────────────

    /// Unescaped attribute value.
    pub fn attr(&self, id: NodeId, key: &str) -> Option<Cow<'_, str>> {
        let NodeKind::Element { attrs, .. } = &self.nodes[id].kind else {
            return None;
        };
        attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, raw)| unescape(raw).unwrap_or(Cow::Borrowed(raw.as_str())))
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        let NodeKind::Element { attrs, .. } = &mut self.nodes[id].kind else {
            return;
        };
        let escaped = escape(value).into_owned();
        match attrs.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = escaped,
            None => attrs.push((key.to_string(), escaped)),
        }
    }

    /// Concatenated character data below `id`.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for &child in &self.nodes[id].children {
            match &self.nodes[child].kind {
                NodeKind::Text(t) | NodeKind::CData(t) => out.push_str(t),
                NodeKind::Element { .. } => self.collect_text(child, out),
                _ => {}
            }
        }
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in std::mem::take(&mut self.nodes[id].children) {
            self.nodes[child].parent = None;
        }
        if !text.is_empty() {
            self.push(id, NodeKind::Text(text.to_string()));
        }
    }

    // ── Structure edits ─────────────────────────────────────────────

    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.push(
            parent,
            NodeKind::Element {
                name: name.to_string(),
                attrs: Vec::new(),
            },
        )
    }

    /// Unlink `id` (and its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }
}

fn element(start: &BytesStart<'_>) -> Result<NodeKind, String> {
    let name = lossy(start.name().as_ref());
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute on <{name}>: {e}"))?;
        attrs.push((lossy(attr.key.as_ref()), lossy(&attr.value)));
    }
    Ok(NodeKind::Element { name, attrs })
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

//! Arena-based DOM for HTML parsing.
//!
//! html5ever parses into this tree; the body extractor and the image
//! rewriter walk and patch it in place before it is serialized again.

use html5ever::{LocalName, QualName};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the arena DOM.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Element with name and attributes.
    Element { name: QualName, attrs: Vec<Attribute> },
    /// Text content.
    Text(String),
    /// Comment.
    Comment(String),
    /// Document type declaration.
    Doctype { name: String },
}

/// HTML attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// A node in the arena DOM.
#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// Arena-based DOM tree.
///
/// All nodes are stored in a contiguous vector; parent/child/sibling links
/// are indices into it. Detached nodes stay allocated but unreachable.
pub struct Dom {
    nodes: Vec<Node>,
    document: NodeId,
}

impl Dom {
    /// Create a new empty DOM with a document root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: NodeId::NONE,
        };
        dom.document = dom.alloc(Node::new(NodeData::Document));
        dom
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the document root ID.
    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        self.alloc(Node::new(NodeData::Element { name, attrs }))
    }

    pub fn create_text(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text)))
    }

    pub fn create_comment(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Comment(text)))
    }

    pub fn create_doctype(&mut self, name: String) -> NodeId {
        self.alloc(Node::new(NodeData::Doctype { name }))
    }

    /// Append a child to a parent node.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
        }

        if last_child.is_some()
            && let Some(last_node) = self.get_mut(last_child)
        {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a node before a sibling.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let parent = self.get(sibling).map(|n| n.parent).unwrap_or(NodeId::NONE);
        let prev = self.get(sibling).map(|n| n.prev_sibling).unwrap_or(NodeId::NONE);

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Unlink a node from its parent and siblings.
    pub fn detach(&mut self, target: NodeId) {
        let Some((parent, prev, next)) = self
            .get(target)
            .map(|n| (n.parent, n.prev_sibling, n.next_sibling))
        else {
            return;
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(target) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Append text to an existing text node, or create new if last child isn't text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(existing) = &mut last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        let first = self.get(parent).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// Iterate over all descendants of `root` in document order (root excluded).
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        let first = self.get(root).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        Descendants {
            dom: self,
            root,
            next: first,
        }
    }

    /// First element with the given local name under `root` (document order).
    pub fn find_by_tag(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(root)
            .find(|&id| self.element_name(id).is_some_and(|n| n.as_ref() == tag))
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a Dom,
    current: NodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self.dom.get(id).map(|n| n.next_sibling).unwrap_or(NodeId::NONE);
        Some(id)
    }
}

/// Pre-order iterator over a subtree, driven by the sibling links.
pub struct Descendants<'a> {
    dom: &'a Dom,
    root: NodeId,
    next: NodeId,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next;
        let node = self.dom.get(current)?;

        self.next = if node.first_child.is_some() {
            node.first_child
        } else {
            // Climb until a node with a next sibling, stopping at the root.
            let mut cursor = current;
            loop {
                if cursor == self.root {
                    break NodeId::NONE;
                }
                let Some(n) = self.dom.get(cursor) else {
                    break NodeId::NONE;
                };
                if n.next_sibling.is_some() {
                    break n.next_sibling;
                }
                cursor = n.parent;
            }
        };

        Some(current)
    }
}

/// Convenience methods for element nodes.
impl Dom {
    /// Get element's local name (tag).
    pub fn element_name(&self, id: NodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    /// Get an attribute value by local name.
    pub fn get_attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.local.as_ref() == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Replace the value of an existing attribute (matched by local name).
    ///
    /// Returns `false` when the node is not an element or lacks the attribute.
    pub fn set_attr(&mut self, id: NodeId, attr_name: &str, value: String) -> bool {
        let Some(NodeData::Element { attrs, .. }) = self.get_mut(id).map(|n| &mut n.data) else {
            return false;
        };
        match attrs.iter_mut().find(|a| a.name.local.as_ref() == attr_name) {
            Some(attr) => {
                attr.value = value;
                true
            }
            None => false,
        }
    }

    /// Get text content of a text node.
    pub fn text_content(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use html5ever::ns;

    use super::*;

    fn make_qname(local: &str) -> QualName {
        QualName::new(None, ns!(html), LocalName::from(local))
    }

    fn attr(name: &str, value: &str) -> Attribute {
        Attribute {
            name: QualName::new(None, ns!(), LocalName::from(name)),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_append_children() {
        let mut dom = Dom::new();

        let parent = dom.create_element(make_qname("div"), vec![]);
        let child1 = dom.create_element(make_qname("p"), vec![]);
        let child2 = dom.create_element(make_qname("p"), vec![]);

        dom.append(dom.document(), parent);
        dom.append(parent, child1);
        dom.append(parent, child2);

        let children: Vec<_> = dom.children(parent).collect();
        assert_eq!(children, [child1, child2]);
    }

    #[test]
    fn test_text_merging() {
        let mut dom = Dom::new();

        let p = dom.create_element(make_qname("p"), vec![]);
        dom.append(dom.document(), p);

        dom.append_text(p, "Hello, ");
        dom.append_text(p, "World!");

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(dom.text_content(children[0]), Some("Hello, World!"));
    }

    #[test]
    fn test_descendants_stay_inside_subtree() {
        let mut dom = Dom::new();
        let doc = dom.document();

        let a = dom.create_element(make_qname("div"), vec![]);
        let a1 = dom.create_element(make_qname("img"), vec![]);
        let a2 = dom.create_element(make_qname("span"), vec![]);
        let a2x = dom.create_element(make_qname("img"), vec![]);
        let b = dom.create_element(make_qname("img"), vec![]);

        dom.append(doc, a);
        dom.append(a, a1);
        dom.append(a, a2);
        dom.append(a2, a2x);
        dom.append(doc, b);

        assert_eq!(dom.descendants(a).collect::<Vec<_>>(), [a1, a2, a2x]);
        assert_eq!(dom.find_by_tag(a2, "img"), Some(a2x));
        assert_eq!(dom.find_by_tag(a2, "span"), None);
        assert!(dom.descendants(a1).next().is_none());
    }

    #[test]
    fn test_detach_and_insert_before() {
        let mut dom = Dom::new();
        let doc = dom.document();
        let first = dom.create_element(make_qname("p"), vec![]);
        let second = dom.create_element(make_qname("p"), vec![]);
        dom.append(doc, first);
        dom.append(doc, second);

        dom.detach(first);
        assert_eq!(dom.children(doc).collect::<Vec<_>>(), [second]);

        dom.insert_before(second, first);
        assert_eq!(dom.children(doc).collect::<Vec<_>>(), [first, second]);
    }

    #[test]
    fn test_set_attr() {
        let mut dom = Dom::new();
        let img = dom.create_element(make_qname("img"), vec![attr("src", "a.png")]);

        assert!(dom.set_attr(img, "src", "b.png".to_string()));
        assert_eq!(dom.get_attr(img, "src"), Some("b.png"));
        assert!(!dom.set_attr(img, "alt", "x".to_string()));
    }
}

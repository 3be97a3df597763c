//! HTML serialization of arena subtrees via html5ever's serializer.

use std::io;

use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope, serialize};

use super::arena::{Dom, NodeData, NodeId};

/// A node borrowed from a [`Dom`], ready for `html5ever::serialize`.
pub struct SerializableNode<'a> {
    dom: &'a Dom,
    node: NodeId,
}

impl<'a> SerializableNode<'a> {
    pub fn new(dom: &'a Dom, node: NodeId) -> Self {
        Self { dom, node }
    }
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        match traversal_scope {
            TraversalScope::IncludeNode => write_node(self.dom, self.node, serializer),
            TraversalScope::ChildrenOnly(_) => {
                for child in self.dom.children(self.node) {
                    write_node(self.dom, child, serializer)?;
                }
                Ok(())
            }
        }
    }
}

fn write_node<S: Serializer>(dom: &Dom, id: NodeId, serializer: &mut S) -> io::Result<()> {
    let Some(node) = dom.get(id) else {
        return Ok(());
    };

    match &node.data {
        NodeData::Element { name, attrs } => {
            serializer.start_elem(
                name.clone(),
                attrs.iter().map(|a| (&a.name, a.value.as_str())),
            )?;
            for child in dom.children(id) {
                write_node(dom, child, serializer)?;
            }
            serializer.end_elem(name.clone())
        }
        NodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, serializer)?;
            }
            Ok(())
        }
        NodeData::Text(text) => serializer.write_text(text),
        NodeData::Comment(text) => serializer.write_comment(text),
        NodeData::Doctype { name } => serializer.write_doctype(name),
    }
}

/// Serialize the children of `node` (its "inner HTML").
pub fn inner_html(dom: &Dom, node: NodeId) -> io::Result<String> {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };

    serialize(&mut bytes, &SerializableNode::new(dom, node), opts)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

//! html5ever TreeSink implementation for Dom.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};

use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute as Html5Attribute, QualName};

use super::arena::{Attribute, Dom, NodeData, NodeId};

/// Handle used by TreeSink to reference nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(pub NodeId);

impl Default for NodeHandle {
    fn default() -> Self {
        NodeHandle(NodeId::NONE)
    }
}

/// TreeSink implementation that builds a [`Dom`].
///
/// Uses interior mutability because html5ever's TreeSink trait takes `&self`.
pub struct DomSink {
    dom: RefCell<Dom>,
    quirks_mode: Cell<QuirksMode>,
}

impl Default for DomSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DomSink {
    pub fn new() -> Self {
        Self {
            dom: RefCell::new(Dom::new()),
            quirks_mode: Cell::new(QuirksMode::NoQuirks),
        }
    }

    /// Consume the sink and return the DOM.
    pub fn into_dom(self) -> Dom {
        self.dom.into_inner()
    }

    fn append_to(&self, parent: NodeId, child: NodeOrText<NodeHandle>) {
        let mut dom = self.dom.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => dom.append(parent, node.0),
            NodeOrText::AppendText(text) => dom.append_text(parent, &text),
        }
    }
}

impl TreeSink for DomSink {
    type Handle = NodeHandle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        // Recovered the way browsers do.
    }

    fn get_document(&self) -> Self::Handle {
        NodeHandle(self.dom.borrow().document())
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };

        let dom = self.dom.borrow();
        match dom.get(target.0).map(|n| &n.data) {
            Some(NodeData::Element { name, .. }) => {
                // SAFETY: names are never mutated or dropped while the sink is
                // alive, and the tree builder uses the returned reference
                // immediately, before any further node is allocated.
                unsafe { std::mem::transmute::<&QualName, &'a QualName>(name) }
            }
            _ => &EMPTY,
        }
    }

    fn create_element(&self, name: QualName, attrs: Vec<Html5Attribute>, _flags: ElementFlags) -> Self::Handle {
        let attrs = attrs
            .into_iter()
            .map(|a| Attribute {
                name: a.name,
                value: a.value.to_string(),
            })
            .collect();

        NodeHandle(self.dom.borrow_mut().create_element(name, attrs))
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        NodeHandle(self.dom.borrow_mut().create_comment(text.to_string()))
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        // Processing instructions only occur in XML; keep an empty comment.
        NodeHandle(self.dom.borrow_mut().create_comment(String::new()))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        self.append_to(parent.0, child);
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let parent = self.dom.borrow().get(element.0).map(|n| n.parent);
        match parent {
            Some(parent) if parent.is_some() => self.append_to(parent, child),
            _ => self.append_to(prev_element.0, child),
        }
    }

    fn append_doctype_to_document(&self, name: StrTendril, _public_id: StrTendril, _system_id: StrTendril) {
        let mut dom = self.dom.borrow_mut();
        let doc = dom.document();
        let doctype = dom.create_doctype(name.to_string());
        dom.append(doc, doctype);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        // Template content is kept inline under the template element.
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.0 == y.0
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        self.quirks_mode.set(mode);
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut dom = self.dom.borrow_mut();
        let node = match new_node {
            NodeOrText::AppendNode(node) => node.0,
            NodeOrText::AppendText(text) => dom.create_text(text.to_string()),
        };
        dom.insert_before(sibling.0, node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Html5Attribute>) {
        let mut dom = self.dom.borrow_mut();
        if let Some(node) = dom.get_mut(target.0)
            && let NodeData::Element { attrs: existing, .. } = &mut node.data
        {
            for attr in attrs {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(Attribute {
                        name: attr.name,
                        value: attr.value.to_string(),
                    });
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.dom.borrow_mut().detach(target.0);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut dom = self.dom.borrow_mut();
        let children: Vec<_> = dom.children(node.0).collect();
        for child in children {
            dom.detach(child);
            dom.append(new_parent.0, child);
        }
    }
}

//! Arena DOM built by html5ever, plus serialization back to HTML.

mod arena;
mod serialize;
mod tree_sink;

pub use arena::{Attribute, Dom, Node, NodeData, NodeId};
pub use serialize::{SerializableNode, inner_html};
pub use tree_sink::{DomSink, NodeHandle};

use html5ever::driver::ParseOpts;
use html5ever::tendril::TendrilSink;

/// Parse an HTML (or tag-soup XHTML) document into a [`Dom`].
///
/// Parsing never fails: html5ever recovers from every error the way a
/// browser would, synthesizing `html`, `head` and `body` as needed.
pub fn parse_document(html: &str) -> Dom {
    html5ever::parse_document(DomSink::new(), ParseOpts::default())
        .one(html)
        .into_dom()
}

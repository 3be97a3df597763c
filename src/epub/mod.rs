//! EPUB package parsing.
//!
//! Pure functions over already-read bytes; archive access lives in
//! [`crate::import::EpubContainer`].

mod parser;

pub use parser::{
    OpfData, OpfItem, parse_container_xml, parse_nav_xhtml, parse_ncx, parse_opf, strip_bom,
};

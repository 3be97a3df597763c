//! Content transforms applied before assets are written
//!
//! - HTML: body extraction, image reference rewriting
//! - CSS: rule categorization, `@font-face` URL rewriting
//! - Minify: whitespace/comment removal for both

pub mod css;
pub mod html;
pub mod minify;

//! Markup and stylesheet minification.
//!
//! Both minifiers are conservative: they only drop comments and collapse
//! whitespace where doing so cannot change how the output renders.

use cssparser::{ParseError, Parser, ParserInput, ToCss, Token, TokenSerializationType};
use memchr::memmem;

type CssParseError<'i> = ParseError<'i, ()>;

/// Elements whose content is copied verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["pre", "textarea", "script", "style"];

/// Elements that start a new line box. Whitespace next to them is not
/// rendered.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "caption", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header",
    "hr", "html", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot",
    "th", "thead", "title", "tr", "ul",
];

// ============================================================================
// HTML
// ============================================================================

/// Minify an HTML fragment.
///
/// - comments are removed
/// - runs of whitespace in text collapse to one space
/// - whitespace-only runs are dropped next to a block-level tag or at either
///   end of the fragment, and kept as one space between inline content
/// - `pre`, `textarea`, `script` and `style` content is kept as-is
pub fn minify_html(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    // Text since the last tag; removed comments do not split it.
    let mut text = String::new();
    let mut after_block = true;
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(lt) = memchr::memchr(b'<', &bytes[pos..]).map(|i| pos + i) else {
            text.push_str(&html[pos..]);
            break;
        };
        text.push_str(&html[pos..lt]);

        let rest = &bytes[lt..];
        if rest.starts_with(b"<!--") {
            pos = match memmem::find(&rest[4..], b"-->") {
                Some(end) => lt + 4 + end + 3,
                None => bytes.len(),
            };
            continue;
        }

        let tag_end = find_tag_end(bytes, lt);
        let tag = &html[lt..tag_end];
        let block = is_block_tag(tag);
        push_text(&mut out, &text, after_block || block);
        text.clear();
        out.push_str(tag);
        after_block = block;
        pos = tag_end;

        if let Some(name) = raw_text_element(&html[lt..tag_end]) {
            let close = find_closing_tag(bytes, pos, name).unwrap_or(bytes.len());
            out.push_str(&html[pos..close]);
            pos = close;
        }
    }

    push_text(&mut out, &text, true);
    out
}

fn push_text(out: &mut String, text: &str, at_block_boundary: bool) {
    if text.is_empty() {
        return;
    }

    if text.bytes().all(|b| b.is_ascii_whitespace()) {
        if !at_block_boundary {
            out.push(' ');
        }
        return;
    }

    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
}

/// End (exclusive) of the tag starting at `start`, honouring quoted
/// attribute values.
fn find_tag_end(bytes: &[u8], start: usize) -> usize {
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(start + 1) {
        match (quote, b) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return i + 1,
            _ => {}
        }
    }
    bytes.len()
}

/// Element name of an opening or closing tag.
fn tag_name(tag: &str) -> &str {
    let inner = tag.strip_prefix('<').unwrap_or(tag);
    let inner = inner.strip_prefix('/').unwrap_or(inner);
    let name_len = inner
        .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
        .unwrap_or(inner.len());
    &inner[..name_len]
}

/// Block-level elements, doctypes and processing instructions.
fn is_block_tag(tag: &str) -> bool {
    let name = tag_name(tag);
    name.starts_with(['!', '?'])
        || BLOCK_ELEMENTS.iter().any(|block| block.eq_ignore_ascii_case(name))
}

/// Name of the raw-text element this tag opens, if any.
fn raw_text_element(tag: &str) -> Option<&'static str> {
    if tag.starts_with("</") || tag.ends_with("/>") {
        return None;
    }
    let name = tag_name(tag);
    RAW_TEXT_ELEMENTS
        .iter()
        .copied()
        .find(|raw| raw.eq_ignore_ascii_case(name))
}

/// Offset of the `</name` that closes a raw-text element.
fn find_closing_tag(bytes: &[u8], from: usize, name: &str) -> Option<usize> {
    let mut pos = from;
    while let Some(i) = memmem::find(&bytes[pos..], b"</") {
        let at = pos + i;
        let candidate = &bytes[at + 2..];
        if candidate.len() >= name.len()
            && candidate[..name.len()].eq_ignore_ascii_case(name.as_bytes())
            && candidate
                .get(name.len())
                .is_none_or(|&b| b.is_ascii_whitespace() || b == b'>' || b == b'/')
        {
            return Some(at);
        }
        pos = at + 2;
    }
    None
}

// ============================================================================
// CSS
// ============================================================================

/// Minify a stylesheet by re-emitting its tokens.
///
/// Comments are dropped, whitespace collapses to a single space, and is
/// removed entirely next to `{ } ; , >` and inside parentheses.
pub fn minify_css(css: &str) -> String {
    let mut output = String::with_capacity(css.len());
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);

    let mut state = MinifyState::default();
    minify_css_recursive(&mut parser, &mut output, &mut state);
    output
}

#[derive(Default)]
struct MinifyState {
    pending_space: bool,
    previous: Option<TokenSerializationType>,
}

fn minify_css_recursive(parser: &mut Parser, output: &mut String, state: &mut MinifyState) {
    while let Ok(token) = parser.next_including_whitespace_and_comments() {
        let token = token.clone();
        match token {
            Token::WhiteSpace(_) => {
                state.pending_space = true;
                continue;
            }
            Token::Comment(_) => continue,
            _ => {}
        }

        let first = first_char(&token);
        if state.pending_space && !output.is_empty() && !space_droppable(output.chars().last(), first) {
            output.push(' ');
        } else if !state.pending_space
            && let Some(previous) = state.previous
            && previous.needs_separator_when_before(token.serialization_type())
        {
            // Tokens were separated only by a dropped comment.
            output.push_str("/**/");
        }
        state.pending_space = false;
        state.previous = Some(token.serialization_type());

        // Writing into a String cannot fail.
        let _ = token.to_css(output);

        let closer = match token {
            Token::CurlyBracketBlock => '}',
            Token::SquareBracketBlock => ']',
            Token::ParenthesisBlock | Token::Function(_) => ')',
            _ => continue,
        };
        let _ = parser.parse_nested_block(|p| {
            let mut inner = MinifyState::default();
            minify_css_recursive(p, output, &mut inner);
            Ok::<_, CssParseError>(())
        });
        output.push(closer);
        state.pending_space = false;
        state.previous = None;
    }
}

/// First character `to_css` will write for a token.
fn first_char(token: &Token) -> Option<char> {
    match token {
        Token::CurlyBracketBlock => Some('{'),
        Token::CloseCurlyBracket => Some('}'),
        Token::Semicolon => Some(';'),
        Token::Comma => Some(','),
        Token::Delim(c) => Some(*c),
        Token::CloseParenthesis => Some(')'),
        _ => None,
    }
}

fn space_droppable(before: Option<char>, after: Option<char>) -> bool {
    matches!(before, Some('{' | '}' | ';' | ',' | '>' | '('))
        || matches!(after, Some('{' | '}' | ';' | ',' | '>' | ')'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_html_collapses_whitespace() {
        let html = "<p>\n  Hello,   <em>world</em>!\n</p>\n\n<p>Next</p>";
        assert_eq!(minify_html(html), "<p> Hello, <em>world</em>! </p><p>Next</p>");
    }

    #[test]
    fn test_minify_html_keeps_inline_spaces_between_tags() {
        assert_eq!(minify_html("<b>a</b> <i>b</i>"), "<b>a</b> <i>b</i>");
    }

    #[test]
    fn test_minify_html_line_break_between_inline_elements_is_a_space() {
        assert_eq!(
            minify_html("<p><span>One</span>\n<span>Two</span></p>"),
            "<p><span>One</span> <span>Two</span></p>"
        );
        assert_eq!(minify_html("<em>a</em>\n  <!-- x -->\n<em>b</em>"), "<em>a</em> <em>b</em>");
    }

    #[test]
    fn test_minify_html_drops_whitespace_next_to_blocks() {
        let html = "\n<div>\n  <p><em>a</em></p>\n  <em>b</em>\n  <br/>\n  <em>c</em>\n</div>\n";
        assert_eq!(minify_html(html), "<div><p><em>a</em></p><em>b</em><br/><em>c</em></div>");
        assert_eq!(minify_html("<P>a</P>\n<H2>b</H2>"), "<P>a</P><H2>b</H2>");
    }

    #[test]
    fn test_minify_html_comment_does_not_split_text() {
        assert_eq!(minify_html("a <!-- x -->\n b"), "a b");
    }

    #[test]
    fn test_minify_html_removes_comments() {
        assert_eq!(minify_html("<p>a<!-- note -->b</p><!-- unterminated"), "<p>ab</p>");
    }

    #[test]
    fn test_minify_html_preserves_raw_text_elements() {
        let html = "<pre>  keep\n   this  </pre>\n<SCRIPT>if (a  <  b) {}</script>";
        assert_eq!(minify_html(html), "<pre>  keep\n   this  </pre><SCRIPT>if (a  <  b) {}</script>");
    }

    #[test]
    fn test_minify_html_quoted_gt_in_attribute() {
        let html = r#"<img alt="a > b"   src="x.png">  text"#;
        assert_eq!(minify_html(html), r#"<img alt="a > b"   src="x.png"> text"#);
    }

    #[test]
    fn test_minify_css() {
        let css = "/* header */\nbody {\n  margin: 0 auto;\n  font-family: \"Serif\", serif;\n}\n\nul > li  a:hover { color : red }";
        assert_eq!(
            minify_css(css),
            "body{margin: 0 auto;font-family: \"Serif\",serif;}ul>li a:hover{color : red}"
        );
    }

    #[test]
    fn test_minify_css_media_query_keeps_required_spaces() {
        let css = "@media screen and (min-width: 600px) {\n  p { margin: 1em }\n}";
        assert_eq!(minify_css(css), "@media screen and (min-width: 600px){p{margin: 1em}}");
    }

    #[test]
    fn test_minify_css_urls_and_functions() {
        let css = "@font-face { src: url(http://h/a.ttf) format( \"truetype\" ) }";
        assert_eq!(minify_css(css), "@font-face{src: url(http://h/a.ttf) format(\"truetype\")}");
    }

    #[test]
    fn test_minify_css_comment_between_idents() {
        assert_eq!(minify_css("a/**/b{}"), "a/**/b{}");
    }
}
